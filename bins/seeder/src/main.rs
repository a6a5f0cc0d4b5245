//! Demo data seeder for Procura development and testing.
//!
//! Seeds a buyer and two supplier companies with contacts, an RFQ open for
//! bidding, and prints access tokens for each demo user.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use sea_orm::{ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde_json::{Value, json};
use uuid::{Uuid, uuid};

use procura_core::machine::Actor;
use procura_core::notify::EventDispatcher;
use procura_core::policy::WorkflowPolicy;
use procura_core::rfq::{RfqInput, RfqItemInput};
use procura_core::{ProcurementService, TransitionRequest};
use procura_db::PgStore;
use procura_db::entities::{company_contacts, rfqs};
use procura_shared::{AppConfig, JwtConfig, JwtService};

const BUYER_COMPANY: Uuid = uuid!("00000000-0000-0000-0000-0000000000b1");
const BUYER_USER: Uuid = uuid!("00000000-0000-0000-0000-0000000000b2");
const SUPPLIER_COMPANIES: [(Uuid, Uuid, &str); 2] = [
    (
        uuid!("00000000-0000-0000-0000-0000000000c1"),
        uuid!("00000000-0000-0000-0000-0000000000c2"),
        "sales@northwind.test",
    ),
    (
        uuid!("00000000-0000-0000-0000-0000000000d1"),
        uuid!("00000000-0000-0000-0000-0000000000d2"),
        "bids@contoso.test",
    ),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;

    println!("Connecting to database...");
    let db = procura_db::connect(&config.database.url).await?;

    println!("Seeding company contacts...");
    seed_contact(&db, BUYER_COMPANY, BUYER_USER, "procurement@acme.test").await?;
    for (company, user, email) in SUPPLIER_COMPANIES {
        seed_contact(&db, company, user, email).await?;
    }

    println!("Seeding demo RFQ...");
    seed_rfq(db, &config).await?;

    let jwt = JwtService::new(JwtConfig {
        secret: config.jwt.secret.clone(),
        access_token_expires_minutes: 24 * 60,
    });
    println!("Demo tokens (valid 24h):");
    println!(
        "  buyer     {}",
        jwt.generate_access_token(BUYER_USER, Some(BUYER_COMPANY), "buyer")?
    );
    for (company, user, email) in SUPPLIER_COMPANIES {
        println!(
            "  supplier  {email}  {}",
            jwt.generate_access_token(user, Some(company), "supplier")?
        );
    }

    println!("Seeding complete!");
    Ok(())
}

async fn seed_contact(
    db: &DatabaseConnection,
    company_id: Uuid,
    user_id: Uuid,
    email: &str,
) -> anyhow::Result<()> {
    let existing = company_contacts::Entity::find()
        .filter(company_contacts::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    if existing.is_some() {
        println!("  {email} already exists, skipping...");
        return Ok(());
    }

    company_contacts::Entity::insert(company_contacts::ActiveModel {
        id: Set(Uuid::new_v4()),
        company_id: Set(company_id),
        user_id: Set(Some(user_id)),
        email: Set(email.to_string()),
        full_name: Set(None),
        created_at: Set(Utc::now().into()),
    })
    .exec_without_returning(db)
    .await?;
    println!("  Created {email}");
    Ok(())
}

async fn seed_rfq(db: DatabaseConnection, config: &AppConfig) -> anyhow::Result<()> {
    let existing = rfqs::Entity::find()
        .filter(rfqs::Column::CompanyId.eq(BUYER_COMPANY))
        .one(&db)
        .await?;
    if let Some(rfq) = existing {
        println!("  {} already exists, skipping...", rfq.reference_number);
        return Ok(());
    }

    let service = ProcurementService::new(
        Arc::new(PgStore::new(db)),
        EventDispatcher::disabled(),
        WorkflowPolicy::from(&config.workflow),
    );
    let buyer = Actor::buyer(BUYER_USER, BUYER_COMPANY);

    let input = RfqInput {
        title: "Office chairs for the Lisbon site".to_string(),
        description: Some("Ergonomic task chairs, delivery to the ground floor.".to_string()),
        bid_deadline: Some(Utc::now() + Duration::days(10)),
        delivery_date: Some(Utc::now() + Duration::days(45)),
        items: vec![
            RfqItemInput {
                name: "Task chair".to_string(),
                description: Some("Adjustable lumbar support".to_string()),
                quantity: dec!(120),
                unit: "pcs".to_string(),
                specifications: Some(json!({ "warranty_years": 5 })),
            },
            RfqItemInput {
                name: "Chair mat".to_string(),
                description: None,
                quantity: dec!(120),
                unit: "pcs".to_string(),
                specifications: None,
            },
        ],
        invited_suppliers: SUPPLIER_COMPANIES.iter().map(|(company, _, _)| *company).collect(),
    };
    let rfq = service.create_rfq(input, &buyer).await?.entity;
    for target in ["published", "bidding_open"] {
        service
            .transition_rfq(rfq.id, TransitionRequest::to(target, Value::Null), &buyer)
            .await?;
    }
    println!("  Created {} and opened bidding", rfq.reference_number);
    Ok(())
}
