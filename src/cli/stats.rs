use anyhow::Result;

use crate::config::RecollectConfig;

/// Display record store counts in the terminal.
pub fn stats(config: &RecollectConfig, json: bool) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = crate::db::open_database(&db_path)?;
    let counts = crate::db::store_counts(&conn)?;

    if json {
        return super::print_json(&counts);
    }

    println!("Record Store");
    println!("{}", "=".repeat(40));
    println!("  Database:            {}", db_path.display());
    println!("  Schema version:      {}", counts.schema_version);
    println!("  Sessions:            {}", counts.sessions);
    println!("  Turns:               {}", counts.turns);
    println!("  Consolidated turns:  {}", counts.consolidated_turns);
    println!("  Checkpoints:         {}", counts.checkpoints);
    println!("  Agents:              {}", counts.agents);
    Ok(())
}
