use std::env;

use rust_decimal::Decimal;
use storefront_api::{
    config::AppConfig,
    db::build_store,
    models::{Color, Role, SizeStock},
    repositories::{NewProduct, ProductRepository, Repositories, UserRepository, users::NewUser},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let store = build_store(&config).await?;
    let Repositories {
        users, products, ..
    } = Repositories::new(store);

    let email = env::var("SEED_ADMIN_EMAIL").unwrap_or_else(|_| "admin@shop.com".to_string());
    let password = env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());
    let admin_id = ensure_admin(&users, &email, &password).await?;
    let seeded = seed_products(&products).await?;

    println!("Seed completed. Admin ID: {admin_id}, products added: {seeded}");
    Ok(())
}

async fn ensure_admin(users: &UserRepository, email: &str, password: &str) -> anyhow::Result<String> {
    if let Some(existing) = users.find_by_email(email).await? {
        users.set_role(&existing.id, Role::Admin).await?;
        println!("Ensured user {email} (role=admin)");
        return Ok(existing.id);
    }

    let user = users
        .create(NewUser {
            name: "Administrator".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: Role::Admin,
            ..Default::default()
        })
        .await?;
    println!("Created admin {email}");
    Ok(user.id)
}

fn sized(sizes: &[(&str, i64)]) -> Vec<SizeStock> {
    sizes
        .iter()
        .map(|(size, stock)| SizeStock {
            size: size.to_string(),
            stock: *stock,
        })
        .collect()
}

fn color(name: &str, hex: &str) -> Color {
    Color {
        name: name.to_string(),
        hex: hex.to_string(),
    }
}

async fn seed_products(products: &ProductRepository) -> anyhow::Result<usize> {
    if products.count_active().await? > 0 {
        println!("Catalog already populated, skipping products");
        return Ok(0);
    }

    let catalog = vec![
        NewProduct {
            name: "Linen Summer Dress".to_string(),
            price: Decimal::new(8900, 2),
            description: "Lightweight linen dress for warm days".to_string(),
            category: "dresses".to_string(),
            stock: 25,
            colors: vec![color("Sand", "#E4D5B7"), color("White", "#FFFFFF")],
            sizes: sized(&[("S", 8), ("M", 10), ("L", 7)]),
            featured: true,
            ..Default::default()
        },
        NewProduct {
            name: "Classic Cotton Shirt".to_string(),
            price: Decimal::new(4500, 2),
            description: "Everyday shirt in soft cotton".to_string(),
            category: "shirts".to_string(),
            stock: 40,
            colors: vec![color("Navy", "#1F2A44")],
            sizes: sized(&[("M", 20), ("L", 20)]),
            ..Default::default()
        },
        NewProduct {
            name: "Leather Tote Bag".to_string(),
            price: Decimal::new(12000, 2),
            description: "Roomy tote in full-grain leather".to_string(),
            category: "accessories".to_string(),
            stock: 8,
            colors: vec![color("Cognac", "#9A463D")],
            featured: true,
            ..Default::default()
        },
        NewProduct {
            name: "Wool Scarf".to_string(),
            price: Decimal::new(2950, 2),
            description: "Warm knitted scarf".to_string(),
            category: "accessories".to_string(),
            stock: 60,
            ..Default::default()
        },
    ];

    let count = catalog.len();
    for product in catalog {
        let created = products.create(product).await?;
        println!("Seeded product {}", created.name);
    }
    Ok(count)
}
