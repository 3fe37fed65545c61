//! MosesPipeline 主程序 - 演示周期
//!
//! 用内置的 AAPL/TSLA/NVDA 场景跑一个完整周期，结果以 JSON 输出到标准输出。

use anyhow::Context;
use chrono::{Duration, Utc};
use moses_pipeline::{
    initialize, AlgorithmContext, AlgorithmFramework, ConfigManager, Holding, Insight,
    InsightDirection, MarketSnapshot, PortfolioState, Scorecard,
};
use std::env;

/// 程序入口点
fn main() {
    if let Err(e) = run_main() {
        tracing::error!("程序运行失败: {:#}", e);
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

/// 主要逻辑函数
fn run_main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        None => run_demo(ConfigManager::new_default()),
        Some("config") => {
            print!("{}", ConfigManager::new_default().to_yaml_string()?);
            Ok(())
        }
        Some("-h") | Some("--help") => {
            print_usage();
            Ok(())
        }
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path))?;
            run_demo(ConfigManager::from_yaml_str(&content)?)
        }
    }
}

/// 运行演示场景
fn run_demo(config_manager: ConfigManager) -> anyhow::Result<()> {
    config_manager.validate()?;
    let config = config_manager.get_config();
    initialize(&config.logging)?;

    let now = Utc::now();
    let mut context = AlgorithmContext::new(
        now,
        vec!["AAPL".to_string(), "TSLA".to_string(), "NVDA".to_string()],
        PortfolioState::new(100_000.0).with_position("AAPL", Holding::long(100.0)),
        MarketSnapshot::default()
            .with_price("AAPL", 150.0)
            .with_price("TSLA", 200.0)
            .with_price("NVDA", 500.0)
            .with_scorecard("AAPL", Scorecard::default().with_metric("altman_z", 3.5))
            .with_scorecard("TSLA", Scorecard::default().with_metric("altman_z", 1.2))
            .with_scorecard("NVDA", Scorecard::default().with_metric("altman_z", 4.0)),
    );

    let insights = vec![
        Insight::price(
            "AAPL",
            now,
            Duration::days(1),
            InsightDirection::Up,
            0.05,
            0.8,
            "BuffettModel",
        )?,
        Insight::price(
            "TSLA",
            now,
            Duration::days(1),
            InsightDirection::Up,
            0.03,
            0.6,
            "MomentumModel",
        )?,
        Insight::price(
            "NVDA",
            now,
            Duration::days(1),
            InsightDirection::Down,
            -0.02,
            0.7,
            "BurryModel",
        )?,
    ];

    let framework = AlgorithmFramework::from_config(config);
    let result = framework.run_cycle(&mut context, &insights)?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    tracing::info!("演示周期完成，耗时 {:?}", result.execution_time);
    Ok(())
}

/// 打印使用说明
fn print_usage() {
    println!("MosesPipeline 洞见-订单流水线");
    println!();
    println!("用法:");
    println!("  moses_pipeline                 # 使用默认配置运行演示周期");
    println!("  moses_pipeline config          # 输出默认 YAML 配置");
    println!("  moses_pipeline <config_file>   # 使用指定配置文件运行演示周期");
}
