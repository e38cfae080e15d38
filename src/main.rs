use std::net::SocketAddr;

use clap::Parser;
use storefront::cli::{
    Args, build_config, handle_create_admin, init_logging, load_jwt_secret, open_database,
    seed_products,
};
use storefront::{create_app, init_cleanup};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(jwt_secret) = load_jwt_secret(args.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    if let Some(email) = args.create_admin.as_deref() {
        if let Err(e) = handle_create_admin(&db, email).await {
            error!(error = %e, "Failed to create admin");
            std::process::exit(1);
        }
    }

    if args.seed_products {
        if let Err(e) = seed_products(&db).await {
            error!(error = %e, "Failed to seed products");
            std::process::exit(1);
        }
    }

    init_cleanup(&db).await;

    let config = build_config(db, jwt_secret, args.secure_cookies, args.ip_header);
    let app = match create_app(&config) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(e) => info!(address = %addr, error = %e, "Listening"),
    }

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, make_service).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
