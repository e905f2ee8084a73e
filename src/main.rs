use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use chain_bootstrap::cli::Args;
use chain_bootstrap::core::Orchestrator;
use chain_bootstrap::ui::{self, RunSummary};
use chain_bootstrap::utils::logger::{init_logger, parse_level};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // --init-config 逻辑
    if args.init_config {
        return match args.init_config_file() {
            Ok(()) => {
                ui::print_success(&format!("已写入默认配置: {}", args.config));
                ExitCode::SUCCESS
            }
            Err(e) => {
                ui::print_error(&e.to_string());
                ExitCode::FAILURE
            }
        };
    }

    let code = run(&args).await;
    if args.pause {
        ui::pause_for_key();
    }
    code
}

async fn run(args: &Args) -> ExitCode {
    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            ui::print_error(&format!("配置加载失败: {}", e));
            return ExitCode::FAILURE;
        }
    };

    let level = parse_level(&config.log_level).unwrap_or(log::LevelFilter::Info);
    if let Err(e) = init_logger(&config.log_file, level, config.log_max_size) {
        ui::print_warning(&format!("日志初始化失败，继续运行: {}", e));
    }
    log::info!(
        "程序启动 v{} ({})",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
    );
    log::info!("配置摘要:\n{}", config.get_summary());

    ui::print_banner();
    ui::print_info(&format!("下载方式: {}", config.method));

    let started = Instant::now();
    let mut orchestrator = Orchestrator::new(args.run_options(config));
    let result = orchestrator.run().await;
    match result {
        Ok(outcome) => {
            if let Some(warning) = &outcome.cleanup_warning {
                ui::print_warning(warning);
            }
            ui::print_success("完成");
            println!(
                "{}",
                RunSummary {
                    destination_file: outcome.destination_file,
                    block_height: outcome.manifest.block_height,
                    total_size: outcome.manifest.total_bytes,
                    elapsed_time: started.elapsed(),
                    imported: outcome.imported,
                }
            );
            log::info!("运行完成");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("阶段 {} 失败: {}", orchestrator.failed_stage(&e).as_str(), e);
            ui::print_error(&e.to_string());
            if e.is_import_tool_missing() {
                ui::print_info("请把导入工具放在本程序同一目录，或使用 --import-tool-path 指定，也可以加 --download-only 只下载。");
            }
            ExitCode::FAILURE
        }
    }
}
