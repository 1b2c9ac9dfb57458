use farmlink_db::{seed_demo, SeedResult, SqlMarketStore};

use crate::commands::{with_migrated_pool, CommandResult};

pub fn run() -> CommandResult {
    let result = with_migrated_pool("seed", |pool| async move {
        seed_demo(&SqlMarketStore::new(pool))
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 6u8))
    });

    match result {
        Ok((_, seeded)) => CommandResult::success("seed", summary(&seeded)),
        Err(failure) => failure,
    }
}

fn summary(seeded: &SeedResult) -> String {
    format!(
        "demo marketplace ready: {} delivery agents inserted ({} already present), \
         {} listings inserted ({} already present)",
        seeded.agents_inserted,
        seeded.agents_skipped,
        seeded.listings_inserted,
        seeded.listings_skipped
    )
}
