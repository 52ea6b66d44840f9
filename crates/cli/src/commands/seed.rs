use crate::commands::{prepare, CommandFailure, CommandResult};
use storefront_db::{connect_with_config, migrations, SampleCatalog, SeedResult};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seed_result = SampleCatalog::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = SampleCatalog::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let failed_checks = verification
            .checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(*check))
            .collect::<Vec<_>>();

        pool.close().await;

        if verification.all_present {
            Ok::<SeedResult, CommandFailure>(seed_result)
        } else {
            Err(("seed_verification", verification_message(&failed_checks), 6u8))
        }
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", summary_message(&seeded)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn summary_message(seeded: &SeedResult) -> String {
    if seeded.categories_inserted == 0 && seeded.products_inserted == 0 {
        return "sample catalog already present; nothing inserted".to_string();
    }
    format!(
        "sample catalog loaded: {} categories and {} products inserted",
        seeded.categories_inserted, seeded.products_inserted
    )
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "some sample catalog rows failed to load".to_string()
    } else {
        format!("sample catalog verification failed for checks: {}", failed_checks.join(", "))
    }
}
