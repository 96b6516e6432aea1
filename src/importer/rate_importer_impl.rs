// ==========================================
// 尾程运价引擎 - 价卡导入器实现
// ==========================================
// 职责: 串联导入管道，从上传文件到价卡落库
// 流程: 读表 → 版式识别 → 列映射(list) → 归一化 → 校验 → 预览缓存 → 确认落库
// ==========================================

use crate::config::{config_keys, ConfigError, RateConfigReader};
use crate::domain::import::{
    FullValidation, ImportOptions, ImportPreview, ImportSummary, ParseResult, ValidationOptions,
};
use crate::domain::rate::{
    NewRateTier, RateCardInfo, RateCardWriteSummary, RateTierCandidate, TierWriteFailure,
};
use crate::domain::table::ColumnMapping;
use crate::domain::types::SheetFormat;
use crate::importer::column_mapper::ColumnMapper as DefaultColumnMapper;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{OcrService, UniversalTableReader};
use crate::importer::format_detector::FormatDetector as DefaultFormatDetector;
use crate::importer::preview_cache::PreviewCache;
use crate::importer::rate_importer_trait::{
    ColumnMapper, FormatDetector, RateImporter, RateNormalizer, RateValidator, TableReader,
};
use crate::importer::rate_normalizer::RateNormalizer as DefaultRateNormalizer;
use crate::importer::rate_validator::RateValidator as DefaultRateValidator;
use crate::repository::RateCardRepository;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// RateImporterImpl - 价卡导入器实现
// ==========================================
pub struct RateImporterImpl {
    // 数据访问层
    rate_card_repo: Arc<dyn RateCardRepository>,

    // 配置读取器
    config: Arc<dyn RateConfigReader>,

    // 管道组件
    table_reader: Box<dyn TableReader>,
    format_detector: Box<dyn FormatDetector>,
    column_mapper: Box<dyn ColumnMapper>,
    normalizer: Box<dyn RateNormalizer>,
    validator: Box<dyn RateValidator>,

    // 临时存储
    parse_cache: PreviewCache<ParseResult>,
    preview_cache: PreviewCache<ImportPreview>,
}

impl RateImporterImpl {
    /// 创建新的 RateImporter 实例
    ///
    /// # 参数
    /// - rate_card_repo: 价卡仓储
    /// - config: 配置读取器
    /// - table_reader: 文件读取器
    /// - format_detector / column_mapper / normalizer / validator: 管道组件
    /// - preview_ttl: 预览有效期
    /// - preview_capacity: 预览缓存容量
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rate_card_repo: Arc<dyn RateCardRepository>,
        config: Arc<dyn RateConfigReader>,
        table_reader: Box<dyn TableReader>,
        format_detector: Box<dyn FormatDetector>,
        column_mapper: Box<dyn ColumnMapper>,
        normalizer: Box<dyn RateNormalizer>,
        validator: Box<dyn RateValidator>,
        preview_ttl: chrono::Duration,
        preview_capacity: usize,
    ) -> Self {
        Self {
            rate_card_repo,
            config,
            table_reader,
            format_detector,
            column_mapper,
            normalizer,
            validator,
            parse_cache: PreviewCache::new(preview_ttl, preview_capacity),
            preview_cache: PreviewCache::new(preview_ttl, preview_capacity),
        }
    }

    /// 按配置装配默认组件
    ///
    /// # 参数
    /// - ocr: OCR 服务（None 时 PDF/图片返回 OcrUnavailable）
    pub async fn from_config(
        rate_card_repo: Arc<dyn RateCardRepository>,
        config: Arc<dyn RateConfigReader>,
        ocr: Option<Arc<dyn OcrService>>,
    ) -> ImportResult<Self> {
        let ttl_secs = config.get_preview_ttl_secs().await?;
        let capacity = config.get_preview_capacity().await?;
        let timeout_secs = config.get_parse_timeout_secs().await?;
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: config_keys::PREVIEW_TTL_SECS.to_string(),
                value: ttl_secs.to_string(),
                message: "超出可表示范围".to_string(),
            })?;

        Ok(Self::new(
            rate_card_repo,
            config,
            Box::new(UniversalTableReader::new(ocr, Duration::from_secs(timeout_secs))),
            Box::new(DefaultFormatDetector),
            Box::new(DefaultColumnMapper),
            Box::new(DefaultRateNormalizer),
            Box::new(DefaultRateValidator),
            ttl,
            capacity,
        ))
    }

    async fn resolve_validation_options(
        &self,
        options: &ImportOptions,
    ) -> ImportResult<ValidationOptions> {
        match &options.validation {
            Some(v) => Ok(v.clone()),
            None => Ok(self.config.get_validation_options().await?),
        }
    }

    /// 无效记录转为写入失败项（原因取该行的错误信息）
    fn rejected_rows(validation: &FullValidation) -> Vec<TierWriteFailure> {
        let mut reasons: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
        for issue in &validation.records.errors {
            reasons
                .entry(issue.row_number)
                .or_default()
                .push(issue.message.as_str());
        }
        validation
            .records
            .invalid
            .iter()
            .map(|c| TierWriteFailure {
                row_number: c.row_number,
                zone_code: c.zone_code.clone(),
                reason: reasons
                    .get(&c.row_number)
                    .map(|r| r.join("; "))
                    .unwrap_or_else(|| "校验未通过".to_string()),
            })
            .collect()
    }

    /// 校验结论 → 落库
    async fn write_validated(
        &self,
        validation: &FullValidation,
        mut info: RateCardInfo,
        options: &ImportOptions,
    ) -> ImportResult<RateCardWriteSummary> {
        if options.block_on_duplicates && !validation.duplicates.is_empty() {
            warn!(duplicates = validation.duplicates.len(), "存在重复重量段，拒绝确认导入");
            return Err(ImportError::DuplicatesBlocking(validation.duplicates.len()));
        }

        let tiers: Vec<NewRateTier> = validation
            .records
            .valid
            .iter()
            .filter_map(NewRateTier::from_candidate)
            .collect();
        if tiers.is_empty() {
            return Err(ImportError::NoValidRecords);
        }

        if info.currency.trim().is_empty() {
            info.currency = self.config.get_default_currency().await?;
        }

        let mut summary = self
            .rate_card_repo
            .create_rate_card_with_tiers(&info, tiers)
            .await
            .map_err(|e| {
                error!(error = %e, carrier_id = info.carrier_id, "价卡写入失败");
                ImportError::from(e)
            })?;

        let rejected = Self::rejected_rows(validation);
        summary.fail_count += rejected.len();
        summary.failures.extend(rejected);
        summary.failures.sort_by_key(|f| f.row_number);
        Ok(summary)
    }
}

#[async_trait]
impl RateImporter for RateImporterImpl {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn parse_file(&self, bytes: Vec<u8>, file_name: &str) -> ImportResult<ParseResult> {
        let start_time = Instant::now();
        info!(file_name, "开始解析价卡文件");

        // === 步骤 1: 读表 ===
        let raw_table = self.table_reader.read_table(&bytes, file_name).await.map_err(|e| {
            error!(file_name, error = %e, "文件解析失败");
            e
        })?;
        debug!(
            rows = raw_table.rows.len(),
            columns = raw_table.column_count(),
            header_row = raw_table.header_row_number,
            "读表完成"
        );

        // === 步骤 2: 版式识别 ===
        let format_detection = self.format_detector.detect(&raw_table);

        // === 步骤 3: 自动列映射（matrix 版式不需要） ===
        let auto_mapping = match format_detection.format {
            SheetFormat::Matrix => None,
            _ => Some(self.column_mapper.auto_map(&raw_table)),
        };

        let parse_id = Uuid::new_v4().to_string();
        let result = ParseResult {
            parse_id: parse_id.clone(),
            file_name: file_name.to_string(),
            raw_table,
            format_detection,
            auto_mapping,
        };
        self.parse_cache.put(parse_id.clone(), result.clone());

        info!(
            file_name,
            parse_id = %parse_id,
            format = %result.format_detection.format,
            confidence = result.format_detection.confidence,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "价卡文件解析完成"
        );
        Ok(result)
    }

    #[instrument(skip(self, parsed, mapping, options), fields(parse_id = %parsed.parse_id))]
    async fn preview_import(
        &self,
        parsed: &ParseResult,
        mapping: Option<ColumnMapping>,
        options: &ImportOptions,
    ) -> ImportResult<ImportPreview> {
        let start_time = Instant::now();

        let format = options
            .format_override
            .unwrap_or(parsed.format_detection.format);
        if format == SheetFormat::Unknown {
            warn!("版式无法识别，需调用方指定");
            return Err(ImportError::UnknownFormat);
        }

        // === 步骤 1: 列映射（list） ===
        let (mapping, mapping_validation) = if format == SheetFormat::List {
            let mapping = mapping
                .or_else(|| parsed.auto_mapping.clone())
                .unwrap_or_else(|| self.column_mapper.auto_map(&parsed.raw_table));
            let mapping_validation = self.column_mapper.validate_mapping(format, &mapping);
            if !mapping_validation.is_valid {
                warn!(missing = ?mapping_validation.missing_roles, "列映射不完整");
                return Err(ImportError::MappingIncomplete {
                    missing: mapping_validation.missing_roles,
                });
            }
            (Some(mapping), Some(mapping_validation))
        } else {
            (None, None)
        };

        // === 步骤 2: 归一化 ===
        let mut normalize_options = options.normalize.clone();
        if normalize_options.default_currency.is_none() {
            normalize_options.default_currency = Some(self.config.get_default_currency().await?);
        }
        let rates = self.normalizer.normalize(
            &parsed.raw_table,
            format,
            &parsed.format_detection,
            mapping.as_ref(),
            &normalize_options,
        )?;

        // === 步骤 3: 校验 ===
        let validation_options = self.resolve_validation_options(options).await?;
        let validation = self.validator.validate(&rates, &validation_options);

        let zone_count = validation
            .records
            .valid
            .iter()
            .map(|c| c.zone_code.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        let summary = ImportSummary {
            total_rows: parsed.raw_table.rows.len(),
            candidate_count: rates.len(),
            valid_count: validation.records.valid.len(),
            invalid_count: validation.records.invalid.len(),
            zone_count,
            duplicate_count: validation.duplicates.len(),
            gap_count: validation.continuity.gaps.len(),
            overlap_count: validation.continuity.overlaps.len(),
            warning_count: validation.records.warnings.len(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        };

        let preview_id = Uuid::new_v4().to_string();
        let preview = ImportPreview {
            preview_id: preview_id.clone(),
            parse_id: Some(parsed.parse_id.clone()),
            format,
            mapping,
            mapping_validation,
            rates,
            validation,
            summary,
        };
        self.preview_cache.put(preview_id.clone(), preview.clone());

        info!(
            preview_id = %preview_id,
            format = %format,
            valid = preview.summary.valid_count,
            invalid = preview.summary.invalid_count,
            status = %preview.validation.status,
            elapsed_ms = preview.summary.elapsed_ms,
            "导入预览生成完成"
        );
        Ok(preview)
    }

    async fn preview_by_parse_id(
        &self,
        parse_id: &str,
        mapping: Option<ColumnMapping>,
        options: &ImportOptions,
    ) -> ImportResult<ImportPreview> {
        let parsed = self
            .parse_cache
            .get(parse_id)
            .ok_or_else(|| ImportError::PreviewExpired(parse_id.to_string()))?;
        self.preview_import(&parsed, mapping, options).await
    }

    #[instrument(skip(self, rates, info, options), fields(carrier_id = info.carrier_id, card_code = %info.card_code))]
    async fn confirm_import(
        &self,
        rates: Vec<RateTierCandidate>,
        info: RateCardInfo,
        options: &ImportOptions,
    ) -> ImportResult<RateCardWriteSummary> {
        let start_time = Instant::now();
        let validation_options = self.resolve_validation_options(options).await?;
        let validation = self.validator.validate(&rates, &validation_options);

        let summary = self.write_validated(&validation, info, options).await?;
        info!(
            rate_card_id = summary.rate_card_id,
            success = summary.success_count,
            failed = summary.fail_count,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "确认导入完成"
        );
        Ok(summary)
    }

    #[instrument(skip(self, info, options), fields(carrier_id = info.carrier_id))]
    async fn confirm_preview(
        &self,
        preview_id: &str,
        info: RateCardInfo,
        options: &ImportOptions,
    ) -> ImportResult<RateCardWriteSummary> {
        let start_time = Instant::now();
        let preview = self
            .preview_cache
            .get(preview_id)
            .ok_or_else(|| ImportError::PreviewExpired(preview_id.to_string()))?;

        let summary = self.write_validated(&preview.validation, info, options).await?;
        self.preview_cache.remove(preview_id);
        if let Some(parse_id) = &preview.parse_id {
            self.parse_cache.remove(parse_id);
        }

        info!(
            preview_id,
            rate_card_id = summary.rate_card_id,
            success = summary.success_count,
            failed = summary.fail_count,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "按预览确认导入完成"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigManager;
    use crate::db::{configure_sqlite_connection, init_schema};
    use crate::repository::RateCardRepositoryImpl;
    use chrono::NaiveDate;
    use rusqlite::Connection;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    const LIST_CSV: &str = "Zone,Weight From,Weight To,Purchase,Sales\n\
                            A,0,5,5.00,7.00\n\
                            A,5,10,8.00,11.00\n";

    async fn importer() -> (RateImporterImpl, Arc<RateCardRepositoryImpl>) {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let repo = Arc::new(RateCardRepositoryImpl::from_connection(conn.clone()));
        let config = Arc::new(ConfigManager::from_connection(conn));
        let importer = RateImporterImpl::from_config(repo.clone(), config, None)
            .await
            .unwrap();
        (importer, repo)
    }

    fn card_info(code: &str) -> RateCardInfo {
        RateCardInfo {
            carrier_id: 1,
            card_code: code.to_string(),
            card_name: format!("{} 价卡", code),
            card_type: "last_mile".to_string(),
            service_type: None,
            valid_from: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            valid_to: None,
            currency: String::new(),
            is_default: true,
            surcharges: vec![],
        }
    }

    #[tokio::test]
    async fn test_parse_preview_confirm_list_sheet() {
        let (importer, repo) = importer().await;
        let parsed = importer
            .parse_file(LIST_CSV.as_bytes().to_vec(), "rates.csv")
            .await
            .unwrap();
        assert_eq!(parsed.format_detection.format, SheetFormat::List);
        assert!(parsed.auto_mapping.is_some());

        let preview = importer
            .preview_by_parse_id(&parsed.parse_id, None, &ImportOptions::default())
            .await
            .unwrap();
        assert_eq!(preview.summary.valid_count, 2);
        assert_eq!(preview.summary.duplicate_count, 0);
        assert_eq!(preview.summary.gap_count, 0);
        assert!(preview.validation.can_proceed);
        assert_eq!(preview.rates[1].purchase_price, Some(dec!(8.00)));
        assert_eq!(preview.rates[1].sales_price, Some(dec!(11.00)));

        let summary = importer
            .confirm_preview(&preview.preview_id, card_info("LIST-1"), &ImportOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.fail_count, 0);

        let card = repo.find_rate_card(summary.rate_card_id).await.unwrap().unwrap();
        assert_eq!(card.currency, "EUR");

        // 确认后预览失效
        let again = importer
            .confirm_preview(&preview.preview_id, card_info("LIST-1"), &ImportOptions::default())
            .await;
        assert!(matches!(again, Err(ImportError::PreviewExpired(_))));
    }

    #[tokio::test]
    async fn test_matrix_sheet_normalizes_every_cell() {
        let (importer, _) = importer().await;
        let csv = ",Zone1,Zone2\n0-5,5.00,6.00\n5-10,8.00,9.50\n";
        let parsed = importer.parse_file(csv.as_bytes().to_vec(), "matrix.csv").await.unwrap();
        assert_eq!(parsed.format_detection.format, SheetFormat::Matrix);
        assert!(parsed.auto_mapping.is_none());

        let preview = importer
            .preview_import(&parsed, None, &ImportOptions::default())
            .await
            .unwrap();
        assert_eq!(preview.rates.len(), 4);
        assert!(preview
            .rates
            .iter()
            .all(|r| r.purchase_price.is_some() && r.sales_price.is_none()));
        assert_eq!(preview.summary.zone_count, 2);
    }

    #[tokio::test]
    async fn test_duplicates_block_only_when_requested() {
        let (importer, _) = importer().await;
        let csv = "Zone,Weight From,Weight To,Purchase\nA,0,5,5\nA,0,5,6\n";
        let parsed = importer.parse_file(csv.as_bytes().to_vec(), "dup.csv").await.unwrap();
        let blocking = ImportOptions {
            block_on_duplicates: true,
            ..ImportOptions::default()
        };
        let preview = importer.preview_import(&parsed, None, &blocking).await.unwrap();
        assert_eq!(preview.summary.duplicate_count, 1);

        let result = importer
            .confirm_preview(&preview.preview_id, card_info("DUP"), &blocking)
            .await;
        assert!(matches!(result, Err(ImportError::DuplicatesBlocking(1))));

        // 不阻断时第二条因唯一约束写入失败并计数
        let summary = importer
            .confirm_preview(&preview.preview_id, card_info("DUP"), &ImportOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.fail_count, 1);
    }

    #[tokio::test]
    async fn test_confirm_import_counts_invalid_rows_as_failures() {
        let (importer, _) = importer().await;
        let rates = vec![
            RateTierCandidate {
                zone_code: "A".to_string(),
                weight_from: Some(0.0),
                weight_to: Some(5.0),
                purchase_price: Some(dec!(5)),
                sales_price: None,
                price_unit: Default::default(),
                currency: None,
                service_type: None,
                row_number: 2,
            },
            RateTierCandidate {
                zone_code: String::new(),
                weight_from: Some(5.0),
                weight_to: Some(10.0),
                purchase_price: Some(dec!(8)),
                sales_price: None,
                price_unit: Default::default(),
                currency: None,
                service_type: None,
                row_number: 3,
            },
        ];
        let summary = importer
            .confirm_import(rates, card_info("MIX"), &ImportOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.fail_count, 1);
        assert_eq!(summary.failures[0].row_number, 3);
    }

    #[tokio::test]
    async fn test_unknown_format_and_incomplete_mapping() {
        let (importer, _) = importer().await;
        let parsed = importer
            .parse_file(b"foo,bar\n1,2\n".to_vec(), "odd.csv")
            .await
            .unwrap();
        assert!(matches!(
            importer.preview_import(&parsed, None, &ImportOptions::default()).await,
            Err(ImportError::UnknownFormat)
        ));

        let forced = ImportOptions {
            format_override: Some(SheetFormat::List),
            ..ImportOptions::default()
        };
        assert!(matches!(
            importer.preview_import(&parsed, None, &forced).await,
            Err(ImportError::MappingIncomplete { .. })
        ));
    }

    #[tokio::test]
    async fn test_pdf_without_ocr_is_unavailable() {
        let (importer, _) = importer().await;
        let result = importer.parse_file(vec![0x25, 0x50], "rates.pdf").await;
        assert!(matches!(result, Err(ImportError::OcrUnavailable(_))));
    }

    #[tokio::test]
    async fn test_oversized_preview_ttl_is_config_error() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let repo = Arc::new(RateCardRepositoryImpl::from_connection(conn.clone()));
        let config = Arc::new(ConfigManager::from_connection(conn));
        config
            .set_config_value(config_keys::PREVIEW_TTL_SECS, "9300000000000000")
            .unwrap();

        let result = RateImporterImpl::from_config(repo, config, None).await;
        assert!(matches!(
            result,
            Err(ImportError::Config(ConfigError::InvalidValue { .. }))
        ));
    }
}
