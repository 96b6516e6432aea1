// ==========================================
// 尾程运价引擎 - 应用状态
// ==========================================
// 职责: 装配读写连接、仓储、引擎与 API 实例
// 约束: 写连接承载导入/配置/运单写入；计价与利润分析只走读连接（WAL）
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{ApiError, ApiResult, ImportApi, PricingApi, ProfitApi};
use crate::config::ConfigManager;
use crate::db::{enable_wal, init_schema, open_sqlite_connection};
use crate::engine::{PricingEngine, ProfitAnalyzer};
use crate::importer::{OcrService, RateImporterImpl};
use crate::repository::{RateCardRepositoryImpl, ShipmentCostRepositoryImpl, ZoneRepositoryImpl};

/// 默认数据库路径的环境变量
pub const DB_PATH_ENV: &str = "FREIGHT_RATE_ENGINE_DB_PATH";

/// 应用状态
///
/// 对外暴露的仓储与配置均在写连接上；计价引擎与利润分析器持有读连接上的独立仓储，
/// 导入事务进行中不阻塞报价。导入 API 持有预览缓存，需在调用间复用
pub struct AppState {
    pub db_path: String,
    pub config: Arc<ConfigManager>,
    pub zone_repo: Arc<ZoneRepositoryImpl>,
    pub rate_card_repo: Arc<RateCardRepositoryImpl>,
    pub shipment_repo: Arc<ShipmentCostRepositoryImpl>,
    pub import_api: Arc<ImportApi>,
    pub pricing_api: Arc<PricingApi>,
    pub profit_api: Arc<ProfitApi>,
}

impl AppState {
    /// 打开（必要时建库）并装配全部组件
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    /// - ocr: OCR 服务（None 时 PDF/图片不可导入）
    pub async fn new(db_path: &str, ocr: Option<Arc<dyn OcrService>>) -> ApiResult<Self> {
        tracing::info!(db_path, "初始化AppState");

        let write_conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseError(format!("无法打开数据库: {}", e)))?;
        init_schema(&write_conn)
            .map_err(|e| ApiError::DatabaseError(format!("建库失败: {}", e)))?;
        let journal_mode = enable_wal(&write_conn)
            .map_err(|e| ApiError::DatabaseError(format!("开启 WAL 失败: {}", e)))?;
        let read_conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseError(format!("无法打开读连接: {}", e)))?;
        tracing::debug!(journal_mode = %journal_mode, "读写连接已就绪");

        let write_conn = Arc::new(Mutex::new(write_conn));
        let read_conn = Arc::new(Mutex::new(read_conn));

        // ==========================================
        // Repository / Config（写连接）
        // ==========================================
        let config = Arc::new(ConfigManager::from_connection(write_conn.clone()));
        let zone_repo = Arc::new(ZoneRepositoryImpl::from_connection(write_conn.clone()));
        let rate_card_repo = Arc::new(RateCardRepositoryImpl::from_connection(write_conn.clone()));
        let shipment_repo = Arc::new(ShipmentCostRepositoryImpl::from_connection(write_conn));

        // ==========================================
        // Importer（写连接）
        // ==========================================
        let importer =
            RateImporterImpl::from_config(rate_card_repo.clone(), config.clone(), ocr).await?;

        // ==========================================
        // Engine（读连接）
        // ==========================================
        let read_rate_cards = Arc::new(RateCardRepositoryImpl::from_connection(read_conn.clone()));
        let pricing_engine = Arc::new(PricingEngine::new(
            read_rate_cards.clone(),
            Arc::new(ZoneRepositoryImpl::from_connection(read_conn.clone())),
            Arc::new(ConfigManager::from_connection(read_conn.clone())),
        ));
        let profit_analyzer = Arc::new(ProfitAnalyzer::new(
            read_rate_cards,
            Arc::new(ShipmentCostRepositoryImpl::from_connection(read_conn)),
        ));

        Ok(Self {
            db_path: db_path.to_string(),
            config,
            zone_repo,
            rate_card_repo,
            shipment_repo,
            import_api: Arc::new(ImportApi::new(Arc::new(importer))),
            pricing_api: Arc::new(PricingApi::new(pricing_engine)),
            profit_api: Arc::new(ProfitApi::new(profit_analyzer)),
        })
    }
}

/// 默认数据库路径：环境变量 > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./freight_rate_engine.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("freight-rate-engine");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("freight_rate_engine.db");
        }
    }
    path.to_string_lossy().to_string()
}
