use crate::commands::{load_config, runtime, CommandResult, StepError};
use goldsmith_db::fixtures::OrderSeedInfo;
use goldsmith_db::{connect_with_config, migrations, DemoSeedDataset};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seed_result = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 5u8))?;

        let run_result: Result<SeedOutput, StepError> = if verification.all_present {
            Ok(SeedOutput {
                customers: seed_result.customers,
                goldsmiths: seed_result.goldsmiths,
                orders: seed_result.orders_seeded,
            })
        } else {
            let failed = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
                .collect::<Vec<_>>();
            Err(("seed_verification", verification_failure_message(&failed), 5u8))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(output) => CommandResult::success("seed", output.summary()),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

struct SeedOutput {
    customers: usize,
    goldsmiths: usize,
    orders: Vec<OrderSeedInfo>,
}

impl SeedOutput {
    fn summary(&self) -> String {
        let order_lines = self
            .orders
            .iter()
            .map(|order| format!("  - {}: {} ({})", order.order_id, order.status, order.description))
            .collect::<Vec<_>>();
        format!(
            "demo dataset loaded: {} customers, {} goldsmiths, {} orders:\n{}",
            self.customers,
            self.goldsmiths,
            self.orders.len(),
            order_lines.join("\n")
        )
    }
}

fn verification_failure_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_failure_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let message = verification_failure_message(&["ORD-demo-002-state", "metal-prices"]);

        assert_eq!(
            message,
            "seed verification failed for checks: ORD-demo-002-state, metal-prices"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_failure_message(&[]), "some seed data failed to load");
    }
}
