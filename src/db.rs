use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let connect_opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(connect_opts)
        .await?;

    migrate(&pool).await?;
    tracing::info!(database_url, "database ready");
    Ok(pool)
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        uid TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        role TEXT NOT NULL CHECK(role IN ('customer', 'seller', 'delivery', 'admin')),
        email_verified INTEGER NOT NULL DEFAULT 0,
        provider TEXT NOT NULL,
        profile_picture TEXT,
        seller_unique_number TEXT UNIQUE,
        details TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        token TEXT PRIMARY KEY,
        uid TEXT NOT NULL,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        FOREIGN KEY(uid) REFERENCES users(uid) ON DELETE CASCADE
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY,
        seller_uid TEXT NOT NULL,
        name TEXT NOT NULL,
        price INTEGER NOT NULL CHECK(price >= 0),
        category TEXT NOT NULL,
        product_image TEXT,
        stock INTEGER NOT NULL DEFAULT 0 CHECK(stock >= 0),
        created_at TEXT NOT NULL,
        FOREIGN KEY(seller_uid) REFERENCES users(uid)
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_products_category ON products(category);",
    r#"
    CREATE TABLE IF NOT EXISTS cart_items (
        customer_uid TEXT NOT NULL,
        product_id TEXT NOT NULL,
        product_name TEXT NOT NULL,
        price INTEGER NOT NULL CHECK(price >= 0),
        quantity INTEGER NOT NULL CHECK(quantity > 0),
        category TEXT NOT NULL,
        product_image TEXT,
        position INTEGER NOT NULL,
        PRIMARY KEY (customer_uid, product_id),
        FOREIGN KEY(customer_uid) REFERENCES users(uid) ON DELETE CASCADE
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS delivery_verifications (
        uid TEXT PRIMARY KEY,
        license_front TEXT NOT NULL,
        license_back TEXT NOT NULL,
        vehicle_front TEXT NOT NULL,
        vehicle_back TEXT NOT NULL,
        rc_image TEXT NOT NULL,
        status TEXT NOT NULL CHECK(status IN ('pending', 'under_review', 'approved', 'rejected', 'resubmission_required')),
        admin_note TEXT,
        submitted_at TEXT NOT NULL,
        reviewed_at TEXT,
        FOREIGN KEY(uid) REFERENCES users(uid) ON DELETE CASCADE
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS branch_link_requests (
        id TEXT PRIMARY KEY,
        requester_uid TEXT NOT NULL,
        target_uid TEXT NOT NULL,
        branch_name TEXT NOT NULL,
        status TEXT NOT NULL CHECK(status IN ('pending', 'accepted', 'denied')),
        created_at TEXT NOT NULL,
        responded_at TEXT,
        FOREIGN KEY(requester_uid) REFERENCES users(uid),
        FOREIGN KEY(target_uid) REFERENCES users(uid)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS branch_stores (
        branch_uid TEXT PRIMARY KEY,
        main_uid TEXT NOT NULL,
        branch_name TEXT NOT NULL,
        linked_at TEXT NOT NULL,
        FOREIGN KEY(branch_uid) REFERENCES users(uid),
        FOREIGN KEY(main_uid) REFERENCES users(uid)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS wallets (
        uid TEXT PRIMARY KEY,
        balance INTEGER NOT NULL DEFAULT 0 CHECK(balance >= 0),
        updated_at TEXT NOT NULL,
        FOREIGN KEY(uid) REFERENCES users(uid) ON DELETE CASCADE
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS wallet_transactions (
        id TEXT PRIMARY KEY,
        uid TEXT NOT NULL,
        kind TEXT NOT NULL CHECK(kind IN ('credit', 'debit')),
        amount INTEGER NOT NULL CHECK(amount > 0),
        balance_after INTEGER NOT NULL,
        description TEXT NOT NULL,
        reference TEXT,
        created_at TEXT NOT NULL,
        seq INTEGER NOT NULL,
        FOREIGN KEY(uid) REFERENCES wallets(uid) ON DELETE CASCADE
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_wallet_transactions_uid ON wallet_transactions(uid, seq);",
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id TEXT PRIMARY KEY,
        customer_uid TEXT NOT NULL,
        items TEXT NOT NULL,
        subtotal INTEGER NOT NULL,
        delivery_fee INTEGER NOT NULL,
        total_amount INTEGER NOT NULL,
        payment_method TEXT NOT NULL CHECK(payment_method IN ('wallet', 'cod')),
        status TEXT NOT NULL CHECK(status IN ('placed', 'out_for_delivery', 'delivered', 'cancelled')),
        delivery_address TEXT NOT NULL,
        delivery_partner_uid TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY(customer_uid) REFERENCES users(uid)
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_orders_customer ON orders(customer_uid);",
];

async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
