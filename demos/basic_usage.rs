// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic sandbank usage example.
//!
//! Demonstrates:
//! 1. Configuring and creating a store
//! 2. Inserting documents (identifiers assigned automatically)
//! 3. Selecting by identifier and by predicate
//! 4. Updating (last insert wins)
//! 5. Forcing a full write and watching the pending count drain
//! 6. Clean shutdown and reload from disk
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use serde::{Deserialize, Serialize};
use sandbank::{Persistable, Sandbank, SandbankConfig};

#[derive(Serialize, Deserialize, Default, Clone, Debug)]
struct PlayerData {
    uid: String,
    name: String,
    health: f32,
    level: i32,
    items: Vec<String>,
}

impl Persistable for PlayerData {
    fn uid(&self) -> &str { &self.uid }
    fn set_uid(&mut self, uid: String) { self.uid = uid; }
    fn type_label() -> &'static str { "demo.PlayerData" }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Simple logging (no filter for simplicity)
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║             sandbank: Basic Usage Example                     ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Configure and create the store
    // ─────────────────────────────────────────────────────────────────────────
    let data_dir = tempfile::tempdir()?;
    println!("📦 Data directory: {}", data_dir.path().display());

    let config = SandbankConfig {
        data_directory: data_dir.path().to_string_lossy().into_owned(),
        // Flush everything at least every 2 seconds for the demo
        full_write_interval_secs: 2.0,
        ..Default::default()
    };

    let db = Sandbank::new(config.clone());
    db.register_type::<PlayerData>()?;
    println!("   State: {}", db.state());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Insert some players
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📝 Inserting 3 players...");

    let mut players = vec![
        PlayerData { name: "alice".into(), health: 100.0, level: 12, items: vec!["sword".into()], ..Default::default() },
        PlayerData { name: "bob".into(), health: 74.5, level: 7, items: vec!["pickaxe".into(), "apple".into()], ..Default::default() },
        PlayerData { name: "carol".into(), health: 31.0, level: 21, items: vec![], ..Default::default() },
    ];
    db.insert_many("players", players.iter_mut()).await?;

    for player in &players {
        println!("   └─ {} → uid {}", player.name, player.uid);
    }
    println!("   ⏳ Pending durable writes: {}", db.pending_write_count());

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Read them back (copies - mutate freely)
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔍 Selecting...");

    let alice: PlayerData = db
        .select_one_by_id("players", &players[0].uid)
        .await?
        .expect("alice was just inserted");
    println!("   └─ by id: {} (health {})", alice.name, alice.health);

    let strong = db.select("players", |p: &PlayerData| p.level >= 10).await?;
    println!("   └─ level >= 10: {:?}", strong.iter().map(|p| &p.name).collect::<Vec<_>>());

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Update: re-inserting the same identifier replaces the document
    // ─────────────────────────────────────────────────────────────────────────
    let mut wounded = PlayerData { health: 8.25, ..alice };
    db.insert("players", &mut wounded).await?;

    let current: PlayerData = db.select_one_by_id("players", &wounded.uid).await?.unwrap();
    println!("\n⚔️  After update, alice's health: {}", current.health);

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Force a full write (normally the background scheduler does this)
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n💾 Forcing a full write...");
    db.force_full_write().await?;
    println!("   ✅ Pending durable writes: {}", db.pending_write_count());

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Shutdown and reload from disk
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🚪 Shutting down...");
    db.shutdown().await;

    let db = Sandbank::new(config);
    db.register_type::<PlayerData>()?;
    let survivors = db.select("players", |_: &PlayerData| true).await?;
    println!("   ✅ Reloaded {} players from disk", survivors.len());

    db.shutdown().await;
    println!("\nDone.\n");
    Ok(())
}
