//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::{Database, NewProduct, Role};
use crate::password;
use crate::rate_limit::RateLimitConfig;
use clap::Parser;
use rand::Rng;
use rand::distr::Alphanumeric;
use std::net::IpAddr;
use tracing::{error, info, warn};

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Length of a generated admin password.
const GENERATED_PASSWORD_LENGTH: usize = 20;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Header carrying the client IP when running behind a reverse proxy.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientIpHeader {
    /// `X-Forwarded-For`; the rightmost entry (added by the nearest proxy) is used
    XForwardFor,
    /// `X-Real-IP`
    XRealIp,
    /// `CF-Connecting-IP`
    CfConnectingIp,
}

/// Strategy for reading the client IP from a proxy header.
#[derive(Clone, Debug)]
pub struct IpExtractor {
    source: ClientIpHeader,
}

impl From<ClientIpHeader> for IpExtractor {
    fn from(source: ClientIpHeader) -> Self {
        Self { source }
    }
}

impl IpExtractor {
    pub fn header_name(&self) -> &'static str {
        match self.source {
            ClientIpHeader::XForwardFor => "x-forwarded-for",
            ClientIpHeader::XRealIp => "x-real-ip",
            ClientIpHeader::CfConnectingIp => "cf-connecting-ip",
        }
    }

    /// Parse the header value into a normalized IP address.
    pub fn extract(&self, value: &str) -> Result<String, &'static str> {
        let candidate = match self.source {
            ClientIpHeader::XForwardFor => value.rsplit(',').next().unwrap_or(value),
            ClientIpHeader::XRealIp | ClientIpHeader::CfConnectingIp => value,
        };
        candidate
            .trim()
            .parse::<IpAddr>()
            .map(|ip| ip.to_string())
            .map_err(|_| "IP header does not contain a valid address")
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "storefront",
    about = "Digital goods storefront with manual payment approval"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000", env = "PORT")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "storefront.db", env = "DATABASE_PATH")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Set the Secure flag on session cookies (enable when served over HTTPS)
    #[arg(long, env = "SECURE_COOKIES")]
    pub secure_cookies: bool,

    /// Read the client IP from this proxy header instead of the socket address
    #[arg(long, value_enum)]
    pub ip_header: Option<ClientIpHeader>,

    /// Create an admin with this email, or reset the password of an existing one.
    /// The password is read from ADMIN_PASSWORD or generated and printed
    #[arg(long, value_name = "EMAIL")]
    pub create_admin: Option<String>,

    /// Insert the sample product catalogue if no products exist
    #[arg(long)]
    pub seed_products: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // SAFETY: called once during startup before the runtime spawns any task that
        // reads the environment.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// Handle the --create-admin flag: create the admin or reset its password.
pub async fn handle_create_admin(db: &Database, email: &str) -> Result<(), String> {
    let (password, generated) = match std::env::var("ADMIN_PASSWORD") {
        Ok(password) if !password.is_empty() => (password, false),
        _ => (generate_password(), true),
    };
    if !password::is_acceptable(&password) {
        return Err(format!(
            "ADMIN_PASSWORD must be at least {} characters",
            password::MIN_PASSWORD_LENGTH
        ));
    }

    let password_hash = password::hash(&password).map_err(|e| e.to_string())?;

    let existing = db
        .users()
        .get_by_email(email)
        .await
        .map_err(|e| format!("Failed to look up {}: {}", email, e))?;

    match existing {
        Some(user) => {
            db.users()
                .update_password(user.id, &password_hash)
                .await
                .map_err(|e| format!("Failed to reset password: {}", e))?;
            if user.role != Role::Admin {
                db.users()
                    .set_role(user.id, Role::Admin)
                    .await
                    .map_err(|e| format!("Failed to promote user: {}", e))?;
            }
            info!(user_id = user.id, "Admin password reset");
        }
        None => {
            let id = db
                .users()
                .create(email, "Administrator", &password_hash, Role::Admin)
                .await
                .map_err(|e| format!("Failed to create admin: {}", e))?;
            info!(user_id = id, "Admin user created");
        }
    }

    println!();
    println!("Admin: {}", email);
    if generated {
        println!("Password: {}", password);
    } else {
        println!("Password: (from ADMIN_PASSWORD)");
    }
    println!();
    Ok(())
}

/// Sample catalogue inserted by --seed-products.
const SAMPLE_PRODUCTS: &[NewProduct<'static>] = &[
    NewProduct {
        name: "E-commerce Website Template",
        description: "Complete online shop template with shopping cart, checkout and admin panel",
        price: 299000,
        file_url: Some("https://example.com/files/ecommerce-template.zip"),
        image_url: Some("/images/products/template-ecommerce.svg"),
        category: Some("Template"),
    },
    NewProduct {
        name: "PHP Application Source Code",
        description: "Full web application source in PHP with a MySQL database",
        price: 450000,
        file_url: Some("https://example.com/files/php-app.zip"),
        image_url: Some("/images/products/php-source-code.svg"),
        category: Some("Source Code"),
    },
    NewProduct {
        name: "Complete Web Development Tutorial",
        description: "E-book covering web development from the basics with 50+ example projects",
        price: 150000,
        file_url: Some("https://example.com/files/web-tutorial.pdf"),
        image_url: Some("/images/products/tutorial-ebook.svg"),
        category: Some("E-book"),
    },
    NewProduct {
        name: "Mobile App UI Kit",
        description: "UI components for mobile apps built on a consistent design system",
        price: 200000,
        file_url: Some("https://example.com/files/ui-kit-mobile.zip"),
        image_url: Some("/images/products/template-ecommerce.svg"),
        category: Some("UI Kit"),
    },
    NewProduct {
        name: "Startup Logo Pack",
        description: "50+ ready-made logos in AI, PNG and SVG",
        price: 100000,
        file_url: Some("https://example.com/files/logo-pack.zip"),
        image_url: Some("/images/products/php-source-code.svg"),
        category: Some("Logo"),
    },
    NewProduct {
        name: "Business Icon Set",
        description: "500+ business icons in SVG and PNG",
        price: 75000,
        file_url: Some("https://example.com/files/icon-set.zip"),
        image_url: Some("/images/products/tutorial-ebook.svg"),
        category: Some("Icon"),
    },
    NewProduct {
        name: "Stock Photos Pack",
        description: "100+ high quality stock photos for websites and marketing",
        price: 120000,
        file_url: Some("https://example.com/files/stock-photos.zip"),
        image_url: Some("/images/products/template-ecommerce.svg"),
        category: Some("Photo"),
    },
];

/// Handle the --seed-products flag. Does nothing when the catalogue is not empty.
pub async fn seed_products(db: &Database) -> Result<usize, sqlx::Error> {
    if db.products().count().await? > 0 {
        warn!("Products already exist, skipping seed");
        return Ok(0);
    }
    for product in SAMPLE_PRODUCTS {
        db.products().create(product).await?;
    }
    info!(count = SAMPLE_PRODUCTS.len(), "Sample products inserted");
    Ok(SAMPLE_PRODUCTS.len())
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    db: Database,
    jwt_secret: String,
    secure_cookies: bool,
    ip_header: Option<ClientIpHeader>,
) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        secure_cookies,
        ip_extractor: ip_header.map(IpExtractor::from),
        rate_limits: RateLimitConfig::default(),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_for_uses_nearest_proxy_entry() {
        let extractor = IpExtractor::from(ClientIpHeader::XForwardFor);
        assert_eq!(
            extractor.extract("198.51.100.1, 203.0.113.7").unwrap(),
            "203.0.113.7"
        );
        assert_eq!(extractor.extract(" 10.0.0.1 ").unwrap(), "10.0.0.1");
        assert!(extractor.extract("not-an-ip").is_err());
    }

    #[test]
    fn test_header_names() {
        assert_eq!(
            IpExtractor::from(ClientIpHeader::XRealIp).header_name(),
            "x-real-ip"
        );
        assert_eq!(
            IpExtractor::from(ClientIpHeader::CfConnectingIp).header_name(),
            "cf-connecting-ip"
        );
    }

    #[test]
    fn test_generated_password() {
        let password = generate_password();
        assert_eq!(password.len(), GENERATED_PASSWORD_LENGTH);
        assert!(password::is_acceptable(&password));
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "storefront",
            "--port",
            "8080",
            "--ip-header",
            "x-forward-for",
            "--create-admin",
            "admin@digitalstore.com",
            "--seed-products",
        ])
        .unwrap();
        assert_eq!(args.port, 8080);
        assert_eq!(args.ip_header, Some(ClientIpHeader::XForwardFor));
        assert_eq!(args.create_admin.as_deref(), Some("admin@digitalstore.com"));
        assert!(args.seed_products);
    }

    #[tokio::test]
    async fn test_seed_products_once() {
        let db = Database::open(":memory:").await.unwrap();
        assert_eq!(seed_products(&db).await.unwrap(), SAMPLE_PRODUCTS.len());
        assert_eq!(seed_products(&db).await.unwrap(), 0);
        assert_eq!(
            db.products().count().await.unwrap(),
            SAMPLE_PRODUCTS.len() as i64
        );
    }

    #[tokio::test]
    async fn test_create_admin_then_reset() {
        let db = Database::open(":memory:").await.unwrap();
        handle_create_admin(&db, "admin@digitalstore.com")
            .await
            .unwrap();
        let first = db
            .users()
            .get_by_email("admin@digitalstore.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.role, Role::Admin);

        handle_create_admin(&db, "admin@digitalstore.com")
            .await
            .unwrap();
        let second = db
            .users()
            .get_by_email("admin@digitalstore.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_ne!(second.password_hash, first.password_hash);
    }
}
