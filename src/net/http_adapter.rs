use actix_files::Files;
use actix_rewrite::Engine;
use actix_web::{App, HttpServer, web};

use crate::core::configuration::Configuration;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_STATIC_PATH: &str = "/var/www/html/";
const DEFAULT_DOCUMENT: &str = "index.html";
const DEFAULT_REMOTE_PATH: &str = "/";

/// Serves the static file tree behind the rewrite middleware.
pub struct HttpAdapter<'a> {
    configuration: &'a Configuration,
    engine: Engine,
}

impl<'a> HttpAdapter<'a> {
    pub fn new(configuration: &'a Configuration, engine: Engine) -> Self {
        Self {
            configuration,
            engine,
        }
    }

    pub async fn run(&self) -> Result<(), std::io::Error> {
        let network = self.configuration.network.as_ref();
        let host = network
            .and_then(|f| f.host.clone())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = network.and_then(|f| f.port).unwrap_or(DEFAULT_PORT);

        let static_files = self.configuration.static_files.as_ref();
        let static_path = static_files
            .and_then(|s| s.path.clone())
            .unwrap_or_else(|| DEFAULT_STATIC_PATH.to_string());
        let remote_path = static_files
            .and_then(|s| s.remote_path.clone())
            .unwrap_or_else(|| DEFAULT_REMOTE_PATH.to_string());
        let index = static_files
            .and_then(|s| s.index.clone())
            .unwrap_or_else(|| DEFAULT_DOCUMENT.to_string());

        tracing::info!(
            %host,
            port,
            %static_path,
            rewrite = %self.engine.inner().status().source,
            "starting http adapter"
        );

        let engine = self.engine.clone();
        let server = HttpServer::new(move || {
            App::new()
                .wrap(engine.clone().middleware())
                .configure(|cfg: &mut web::ServiceConfig| {
                    config(cfg, &remote_path, &static_path, &index)
                })
        })
        .bind(format!("{host}:{port}"))?
        .run();

        let result = server.await;
        self.engine.inner().shutdown();
        result
    }
}

fn config(cfg: &mut web::ServiceConfig, remote_path: &str, static_path: &str, index: &str) {
    cfg.service(
        Files::new(remote_path, static_path)
            .index_file(index)
            .use_last_modified(true)
            .prefer_utf8(true),
    );
}
