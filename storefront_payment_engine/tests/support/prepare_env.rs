use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use storefront_payment_engine::{
    db_types::{MinorUnits, Product},
    PaymentGatewayDatabase,
    SqliteDatabase,
};

pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
    db
}

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/spg_test_{:016x}.db", dir.display(), rand::random::<u64>())
}

pub async fn create_database(url: &str) {
    if let Err(e) = Sqlite::drop_database(url).await {
        trace!("Nothing to drop at {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    info!("Created Sqlite database {url}");
}

pub async fn tear_down(mut db: SqliteDatabase) {
    let url = db.url().to_string();
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(&url).await.expect("Error dropping database");
}

pub async fn seed_catalog(db: &SqliteDatabase) {
    let products: [(&str, &str, Option<&str>, i64, bool); 4] = [
        ("tshirt", "Logo T-Shirt", Some("apparel"), 33_333, true),
        ("hoodie", "Zip Hoodie", Some("apparel"), 40_000, true),
        ("sticker", "Sticker", None, 100, true),
        ("poster", "Tour Poster (sold out)", Some("prints"), 25_000, false),
    ];
    for (product_id, name, category, price, available) in products {
        let product = Product {
            product_id: product_id.into(),
            name: name.into(),
            category: category.map(String::from),
            price: MinorUnits::from(price),
            available,
        };
        db.upsert_product(&product).await.expect("Error seeding catalog");
    }
}
