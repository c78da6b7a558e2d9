use std::time::Duration;

use crate::pipeline::{BatchReport, RecipeOutcome, RecipeStatus, UnitState};

/// 打印单个食谱的处理结果
pub fn print_recipe_outcome(outcome: &RecipeOutcome) {
    let icon = status_icon(outcome.status);
    println!("{} {} [{}] ({})", icon, outcome.url, outcome.status, format_duration(outcome.elapsed));

    if let Some(error) = &outcome.error {
        println!("   错误: {}", error);
    }

    for unit in &outcome.units {
        match unit.state {
            UnitState::Done => {
                println!("   ✅ {}: {}", unit.lang, unit.target_url.as_deref().unwrap_or("-"));
            }
            UnitState::Failed => {
                let stage = unit.failed_at.map(|s| s.to_string()).unwrap_or_default();
                println!(
                    "   ❌ {} (停在 {}): {}",
                    unit.lang,
                    stage,
                    unit.error.as_deref().unwrap_or("未知错误")
                );
            }
            other => println!("   ⏸️ {}: {}", unit.lang, other),
        }
    }

    if let Some(path) = &outcome.saved_to {
        println!("   💾 {}", path.display());
    }
}

/// 打印批次汇总报告
pub fn print_batch_summary(report: &BatchReport) {
    println!("\n📊 批量翻译报告:");
    println!("═══════════════════════════════════════");

    for outcome in &report.outcomes {
        print_recipe_outcome(outcome);
    }

    println!("\n📈 汇总:");
    println!("   食谱总数: {}", report.total());
    println!("   全部完成: {}", report.count(RecipeStatus::Done));
    println!("   部分完成: {}", report.count(RecipeStatus::Partial));
    println!("   失败: {}", report.count(RecipeStatus::Failed));
    if report.was_interrupted() {
        println!("   跳过 (已中断): {}", report.count(RecipeStatus::Skipped));
    }
    println!(
        "   语言单元: {} 成功 / {} 失败",
        report.units_done(),
        report.units_failed()
    );
    println!("   总耗时: {}", format_duration(report.elapsed));

    let processed = report.total() - report.count(RecipeStatus::Skipped);
    if processed > 0 {
        println!(
            "   平均每个食谱: {}",
            format_duration(report.elapsed / processed as u32)
        );
    }
}

fn status_icon(status: RecipeStatus) -> &'static str {
    match status {
        RecipeStatus::Done => "🏆",
        RecipeStatus::Partial => "⚠️",
        RecipeStatus::Failed => "❌",
        RecipeStatus::Skipped => "⏭️",
    }
}

/// 格式化持续时间
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else if duration.as_secs() < 60 {
        format!("{:.3}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.500s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m05s");
    }

    #[test]
    fn test_status_icons_are_distinct() {
        let icons = [
            status_icon(RecipeStatus::Done),
            status_icon(RecipeStatus::Partial),
            status_icon(RecipeStatus::Failed),
            status_icon(RecipeStatus::Skipped),
        ];
        for (i, a) in icons.iter().enumerate() {
            for b in &icons[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
