use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct Info {
    git_version: &'static str,
    build_date: &'static str,
    rust_version: &'static str,
    platform: String,
}

pub async fn get_version() -> Json<Info> {
    Json(Info {
        git_version: env!("CARGO_PKG_VERSION"),
        build_date: option_env!("CAPACITY_BUILD_DATE").unwrap_or("unknown"),
        rust_version: env!("CARGO_PKG_RUST_VERSION"),
        platform: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
    })
}
