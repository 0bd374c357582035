// chainコマンド - 大文字化Unitから文字数Unitへ連結したパイプライン

use super::{feed_until_shutdown, simulate_work};
use crate::cli::RunArgs;
use crate::core::UnitReport;
use crate::unit::Unit;
use anyhow::Result;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

fn random_word() -> String {
    to_base36(rand::rng().random())
}

/// chainデモを実行し、上流・下流の順にレポートを返す
pub async fn execute_chain(args: RunArgs) -> Result<Vec<UnitReport>> {
    let max_delay = args.max_delay();

    let mut length: Unit<String, usize> = Unit::with_options(args.unit_options("length"))?;
    length.on_execute(move |s: String| async move {
        simulate_work(max_delay).await;
        Ok(s.len())
    })?;
    let mut lengths = length.output()?;
    let mut length_errors = length.errors()?;
    let length = Arc::new(length);

    let mut upper: Unit<String, String> = Unit::with_options(args.unit_options("upper"))?;
    upper.on_execute(move |s: String| async move {
        simulate_work(max_delay).await;
        Ok(s.to_uppercase())
    })?;
    let mut upper_errors = upper.errors()?;
    upper.set_next_unit(length.clone())?;

    // 下流へも連鎖して開始される
    upper.start()?;

    let consumer = tokio::spawn(async move {
        let mut received = 0u64;
        while let Some(len) = lengths.recv().await {
            info!(len, "文字数を受信しました");
            received += 1;
        }
        received
    });
    let error_logger = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(record) = upper_errors.recv() => {
                    warn!(input = %record.input, error = %record, "大文字化に失敗しました");
                }
                Some(record) = length_errors.recv() => {
                    warn!(input = %record.input, error = %record, "文字数計算に失敗しました");
                }
                else => break,
            }
        }
    });

    let input = upper.input();
    let sent = feed_until_shutdown(&input, args.max_items, |_| random_word()).await;

    // 上流の停止後、同じデッドラインの残り時間で下流も停止する
    upper.stop(args.stop_timeout()).await?;
    let received = consumer.await?;
    error_logger.await?;
    info!(sent, received, "chainデモが終了しました");

    Ok(vec![upper.report(), length.report()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{NextUnit, Phase};

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(u64::MAX), "3w5e11264sgsf");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_execute_chain_reaches_the_last_stage() {
        let args = RunArgs {
            workers: Some(2),
            stop_timeout_secs: 10,
            max_items: Some(40),
            max_delay_ms: 0,
        };

        let reports = execute_chain(args).await.unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].name, "upper");
        assert_eq!(reports[1].name, "length");
        for report in &reports {
            assert_eq!(report.phase, Phase::Stopped);
            assert_eq!(report.state.total, 40);
            assert_eq!(report.state.done, 40);
        }
    }

    #[tokio::test]
    async fn test_downstream_cannot_be_started_twice_through_chain() {
        let mut length: Unit<String, usize> = Unit::new();
        length
            .on_execute(|s: String| async move { Ok(s.len()) })
            .unwrap();
        let length = Arc::new(length);
        NextUnit::start(length.as_ref()).unwrap();

        let mut upper: Unit<String, String> = Unit::new();
        upper
            .on_execute(|s: String| async move { Ok(s.to_uppercase()) })
            .unwrap();
        upper.set_next_unit(length.clone()).unwrap();

        let error = upper.start().unwrap_err();
        assert!(matches!(error.root(), crate::core::UnitError::AlreadyStarted));
        assert_eq!(upper.phase(), Phase::NotStarted);
        length.stop(std::time::Duration::from_secs(5)).await.unwrap();
    }
}
