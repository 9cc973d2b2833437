use actix_cors::Cors;
use actix_web::{web, App, HttpServer};

use scrawl_server::config::ServerConfig;
use scrawl_server::connection::ws_index;
use scrawl_server::gateway::spawn_gateway;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = ServerConfig::from_env();
    let store = config.build_store();
    let srv_tx = spawn_gateway(store);

    let bind = config.bind();
    log::info!("listening on {}", bind);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .data(srv_tx.clone())
            .route("/ws/", web::get().to(ws_index))
    })
    .bind(bind)?
    .run()
    .await
}
