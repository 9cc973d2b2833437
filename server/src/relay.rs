use scrawl_system::DrawingEvent;

/// Canvas reconciliation state for one lobby. Incremental events pass
/// straight through; only the latest full-raster snapshot is retained as
/// the baseline a freshly seated connection needs before any further
/// incremental event.
pub struct CanvasRelay {
    baseline: Option<Vec<u8>>,
}

impl CanvasRelay {
    pub fn new() -> Self {
        Self { baseline: None }
    }

    /// A new turn starts from a blank canvas.
    pub fn reset(&mut self) {
        self.baseline = None;
    }

    pub fn observe(&mut self, event: &DrawingEvent) {
        match event {
            DrawingEvent::Snapshot { raster } => self.baseline = Some(raster.clone()),
            DrawingEvent::Clear => self.baseline = None,
            DrawingEvent::Line { .. } | DrawingEvent::Dot { .. } | DrawingEvent::Fill { .. } => {}
        }
    }

    pub fn baseline(&self) -> Option<DrawingEvent> {
        self.baseline
            .as_ref()
            .map(|raster| DrawingEvent::Snapshot {
                raster: raster.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrawl_system::{Color, Point};

    #[test]
    fn it_keeps_only_the_latest_snapshot_as_baseline() {
        let mut relay = CanvasRelay::new();
        assert!(relay.baseline().is_none());

        relay.observe(&DrawingEvent::Snapshot { raster: vec![1] });
        relay.observe(&DrawingEvent::Line {
            from: Point { x: 0.0, y: 0.0 },
            to: Point { x: 1.0, y: 1.0 },
            color: Color::default(),
            width: 2.0,
        });
        relay.observe(&DrawingEvent::Snapshot { raster: vec![2] });

        match relay.baseline() {
            Some(DrawingEvent::Snapshot { raster }) => assert_eq!(raster, vec![2]),
            other => panic!("unexpected baseline: {:?}", other),
        }
    }

    #[test]
    fn it_drops_the_baseline_on_clear_and_reset() {
        let mut relay = CanvasRelay::new();
        relay.observe(&DrawingEvent::Snapshot { raster: vec![1] });
        relay.observe(&DrawingEvent::Clear);
        assert!(relay.baseline().is_none());

        relay.observe(&DrawingEvent::Snapshot { raster: vec![1] });
        relay.reset();
        assert!(relay.baseline().is_none());
    }
}
