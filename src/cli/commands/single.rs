// singleコマンド - 1段のUnitでユーザーごとの在庫を生成する

use super::{feed_until_shutdown, simulate_work};
use crate::cli::RunArgs;
use crate::core::UnitReport;
use crate::unit::Unit;
use anyhow::Result;
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInventory {
    pub user: User,
    pub items: Vec<u32>,
}

fn random_items() -> Vec<u32> {
    let mut rng = rand::rng();
    (0..3).map(|_| rng.random_range(0..1000)).collect()
}

/// singleデモを実行し、停止後のレポートを返す
pub async fn execute_single(args: RunArgs) -> Result<UnitReport> {
    let mut unit: Unit<User, UserInventory> = Unit::with_options(args.unit_options("inventory"))?;
    let max_delay = args.max_delay();
    unit.on_execute(move |user: User| async move {
        simulate_work(max_delay).await;
        Ok(UserInventory {
            user,
            items: random_items(),
        })
    })?;

    let mut output = unit.output()?;
    let mut errors = unit.errors()?;
    unit.start()?;

    let consumer = tokio::spawn(async move {
        let mut received = 0u64;
        while let Some(inventory) = output.recv().await {
            info!(user = %inventory.user.name, items = ?inventory.items, "在庫を生成しました");
            received += 1;
        }
        received
    });
    let error_logger = tokio::spawn(async move {
        while let Some(record) = errors.recv().await {
            warn!(user = %record.input.name, error = %record, "在庫生成に失敗しました");
        }
    });

    let input = unit.input();
    let sent = feed_until_shutdown(&input, args.max_items, |i| User {
        name: format!("User{i}"),
    })
    .await;

    unit.stop(args.stop_timeout()).await?;
    let received = consumer.await?;
    error_logger.await?;
    info!(sent, received, "singleデモが終了しました");

    Ok(unit.report())
}
