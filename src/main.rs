// ==========================================
// 尾程运价引擎 - 命令行入口
// ==========================================
// 用法:
//   freight-rate-engine init   <db>
//   freight-rate-engine import <db> <file> <carrier_id> <card_code>
//   freight-rate-engine quote  <db> <carrier_id> <zone|postal:country> <weight_kg>
// <db> 为 "-" 时使用默认数据库路径
// ==========================================

use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use freight_rate_engine::app::{get_default_db_path, AppState};
use freight_rate_engine::domain::import::ImportOptions;
use freight_rate_engine::domain::quote::QuoteRequest;
use freight_rate_engine::domain::rate::RateCardInfo;
use freight_rate_engine::logging;

const USAGE: &str = "用法:
  freight-rate-engine init   <db>
  freight-rate-engine import <db> <file> <carrier_id> <card_code>
  freight-rate-engine quote  <db> <carrier_id> <zone|postal:country> <weight_kg>";

fn resolve_db_path(arg: Option<String>) -> anyhow::Result<String> {
    match arg {
        Some(p) if p == "-" => Ok(get_default_db_path()),
        Some(p) => Ok(p),
        None => bail!("缺少数据库路径\n{}", USAGE),
    }
}

fn required(arg: Option<String>, name: &str) -> anyhow::Result<String> {
    arg.filter(|s| !s.trim().is_empty())
        .ok_or_else(|| anyhow!("缺少参数 <{}>\n{}", name, USAGE))
}

/// "A" → 分区代码；"75001:FR" → 邮编 + 国家
fn parse_destination(raw: &str, request: &mut QuoteRequest) {
    match raw.split_once(':') {
        Some((postal, country)) => {
            request.postal_code = Some(postal.trim().to_string()).filter(|s| !s.is_empty());
            request.country_code = Some(country.trim().to_string()).filter(|s| !s.is_empty());
        }
        None => request.zone_code = Some(raw.trim().to_string()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_default();

    match command.as_str() {
        "init" => {
            let db_path = resolve_db_path(args.next())?;
            AppState::new(&db_path, None).await?;
            tracing::info!(db_path = %db_path, "数据库初始化完成");
            println!("{}", db_path);
        }
        "import" => {
            let db_path = resolve_db_path(args.next())?;
            let file = required(args.next(), "file")?;
            let carrier_id: i64 = required(args.next(), "carrier_id")?
                .parse()
                .context("carrier_id 必须为整数")?;
            let card_code = required(args.next(), "card_code")?;

            let bytes = std::fs::read(&file).with_context(|| format!("无法读取文件 {}", file))?;
            let file_name = std::path::Path::new(&file)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| file.clone());

            let state = AppState::new(&db_path, None).await?;
            let info = RateCardInfo {
                carrier_id,
                card_code: card_code.clone(),
                card_name: card_code,
                card_type: "last_mile".to_string(),
                service_type: None,
                valid_from: Utc::now().date_naive(),
                valid_to: None,
                currency: String::new(),
                is_default: true,
                surcharges: vec![],
            };
            let response = state
                .import_api
                .import_file(bytes, &file_name, info, &ImportOptions::default())
                .await?;
            println!("{}", serde_json::to_string_pretty(&response.write)?);
        }
        "quote" => {
            let db_path = resolve_db_path(args.next())?;
            let carrier_id: i64 = required(args.next(), "carrier_id")?
                .parse()
                .context("carrier_id 必须为整数")?;
            let destination = required(args.next(), "zone|postal:country")?;
            let weight_kg: f64 = required(args.next(), "weight_kg")?
                .parse()
                .context("weight_kg 必须为数字")?;

            let mut request = QuoteRequest {
                carrier_id,
                weight_kg,
                ..QuoteRequest::default()
            };
            parse_destination(&destination, &mut request);

            let state = AppState::new(&db_path, None).await?;
            let result = state.pricing_api.calculate_freight(&request).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => bail!("{}", USAGE),
    }

    Ok(())
}
