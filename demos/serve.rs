use axum::extract::Query;
use axum::http::header::RANGE;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use axum_deliver::{Deliverer, DeliveryOptions, Sendfile};

#[derive(Debug, Deserialize)]
struct FileRequest {
    path: String,
    #[serde(default)]
    download: bool,
}

async fn get_file(
    Query(request): Query<FileRequest>,
    headers: HeaderMap,
) -> impl IntoResponse {
    // set SENDFILE_PREFIX to an internal nginx location to delegate
    let deliverer = match std::env::var("SENDFILE_PREFIX") {
        Ok(prefix) => Deliverer::new().with_sendfile(Sendfile::accel_redirect(prefix)),
        Err(_) => Deliverer::new(),
    };

    let mut options = DeliveryOptions::new();
    if request.download {
        options = options.force_download(true);
    }

    let range = headers.get(RANGE).and_then(|value| value.to_str().ok());
    match deliverer.deliver(&request.path, options, range).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let router = Router::new().route("/file", get(get_file));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    tracing::info!("serving on 0.0.0.0:3000, try /file?path=test/fixture.txt");
    axum::serve(listener, router).await.unwrap();
}
