use clap::Parser;
use shop_orders_etl::domain::model::{DomainConfig, DomainRunSummary};
use shop_orders_etl::domain::ports::Warehouse;
use shop_orders_etl::utils::{logger, validation::Validate};
use shop_orders_etl::{
    BigQueryWarehouse, CliArgs, CsvWarehouse, EtlEngine, EtlError, OrderPipeline,
    ShopifyClient, WarehouseKind,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // 初始化日誌
    if args.log_json {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting shop-orders-etl");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    match run(&args).await {
        Ok(summaries) => {
            for summary in &summaries {
                if summary.skipped {
                    tracing::info!("⏭️  {}: no new orders", summary.domain);
                } else {
                    tracing::info!(
                        "✅ {}: {} orders fetched, {} rows loaded",
                        summary.domain,
                        summary.orders_fetched,
                        summary.rows_loaded
                    );
                }
            }
            println!("✅ ETL process completed for {} domains", summaries.len());
        }
        Err(e) => {
            tracing::error!(
                "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            std::process::exit(e.severity().exit_code());
        }
    }

    Ok(())
}

async fn run(args: &CliArgs) -> Result<Vec<DomainRunSummary>, EtlError> {
    let config = args.load_config()?;
    config.validate()?;
    let domains = config.select_domains(&args.domains)?;

    let options = config.fetch.to_options();
    let timeout = options.timeout;
    let source = ShopifyClient::new(options)?;

    match config.warehouse.kind {
        WarehouseKind::Csv => {
            tracing::info!("💾 Warehouse: CSV tables under {}", config.warehouse.path);
            let warehouse = CsvWarehouse::new(&config.warehouse.path);
            run_with(source, warehouse, &domains, args.dry_run).await
        }
        WarehouseKind::Bigquery => {
            let bq = config.warehouse.bigquery_config()?;
            tracing::info!("💾 Warehouse: BigQuery {}.{}", bq.project, bq.dataset);
            let warehouse = BigQueryWarehouse::new(bq, timeout)?;
            run_with(source, warehouse, &domains, args.dry_run).await
        }
    }
}

async fn run_with<W: Warehouse>(
    source: ShopifyClient,
    warehouse: W,
    domains: &[DomainConfig],
    dry_run: bool,
) -> Result<Vec<DomainRunSummary>, EtlError> {
    tracing::debug!("Selected domains: {:?}", domains);
    let engine = EtlEngine::new(OrderPipeline::new(source, warehouse)).with_dry_run(dry_run);
    engine.run(domains).await
}
