// ==========================================
// 价卡导入API
// ==========================================
// 职责: 封装价卡导入流程（解析 → 预览 → 确认），校验调用方输入
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::import::{ImportOptions, ImportPreview, ParseResult};
use crate::domain::rate::{RateCardInfo, RateCardWriteSummary, RateTierCandidate};
use crate::domain::table::ColumnMapping;
use crate::importer::RateImporter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// 一步导入（解析 + 预览 + 确认）的响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFileResponse {
    pub preview: ImportPreview,
    pub write: RateCardWriteSummary,
}

/// 价卡导入API
pub struct ImportApi {
    importer: Arc<dyn RateImporter>,
}

impl ImportApi {
    /// 创建新的ImportApi实例（预览缓存由 importer 持有，需在多次调用间共享）
    pub fn new(importer: Arc<dyn RateImporter>) -> Self {
        Self { importer }
    }

    /// 解析上传文件
    ///
    /// # 返回
    /// - Ok(ParseResult): 原始表格 + 版式识别 + 自动列映射
    /// - Err(ApiError): 文件为空、格式不支持、解析失败
    pub async fn parse_file(&self, bytes: Vec<u8>, file_name: &str) -> ApiResult<ParseResult> {
        if file_name.trim().is_empty() {
            return Err(ApiError::InvalidInput("文件名不能为空".to_string()));
        }
        if bytes.is_empty() {
            return Err(ApiError::InvalidInput(format!("文件内容为空: {}", file_name)));
        }
        Ok(self.importer.parse_file(bytes, file_name).await?)
    }

    /// 按 parse_id 生成导入预览
    pub async fn preview_import(
        &self,
        parse_id: &str,
        mapping: Option<ColumnMapping>,
        options: &ImportOptions,
    ) -> ApiResult<ImportPreview> {
        Ok(self
            .importer
            .preview_by_parse_id(parse_id, mapping, options)
            .await?)
    }

    /// 按调用方提交的记录确认导入
    pub async fn confirm_import(
        &self,
        rates: Vec<RateTierCandidate>,
        info: RateCardInfo,
        options: &ImportOptions,
    ) -> ApiResult<RateCardWriteSummary> {
        validate_card_info(&info)?;
        if rates.is_empty() {
            return Err(ApiError::InvalidInput("待导入记录为空".to_string()));
        }
        Ok(self.importer.confirm_import(rates, info, options).await?)
    }

    /// 按 preview_id 确认导入
    pub async fn confirm_preview(
        &self,
        preview_id: &str,
        info: RateCardInfo,
        options: &ImportOptions,
    ) -> ApiResult<RateCardWriteSummary> {
        validate_card_info(&info)?;
        Ok(self.importer.confirm_preview(preview_id, info, options).await?)
    }

    /// 一步导入：解析 → 预览（自动映射）→ 确认
    pub async fn import_file(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        info: RateCardInfo,
        options: &ImportOptions,
    ) -> ApiResult<ImportFileResponse> {
        validate_card_info(&info)?;
        let parsed = self.parse_file(bytes, file_name).await?;
        let preview = self
            .importer
            .preview_import(&parsed, None, options)
            .await?;
        let write = self
            .importer
            .confirm_preview(&preview.preview_id, info, options)
            .await?;
        info!(
            file_name,
            rate_card_id = write.rate_card_id,
            success = write.success_count,
            failed = write.fail_count,
            "价卡文件导入完成"
        );
        Ok(ImportFileResponse { preview, write })
    }
}

/// 价卡头信息校验
pub fn validate_card_info(info: &RateCardInfo) -> ApiResult<()> {
    if info.carrier_id <= 0 {
        return Err(ApiError::InvalidInput(format!(
            "承运商ID无效: {}",
            info.carrier_id
        )));
    }
    if info.card_code.trim().is_empty() {
        return Err(ApiError::InvalidInput("价卡编码不能为空".to_string()));
    }
    if let Some(valid_to) = info.valid_to {
        if valid_to < info.valid_from {
            return Err(ApiError::InvalidInput(format!(
                "有效期结束日 {} 早于开始日 {}",
                valid_to, info.valid_from
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn info() -> RateCardInfo {
        RateCardInfo {
            carrier_id: 1,
            card_code: "C1".to_string(),
            card_name: "C1".to_string(),
            card_type: "last_mile".to_string(),
            service_type: None,
            valid_from: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            valid_to: None,
            currency: "EUR".to_string(),
            is_default: false,
            surcharges: vec![],
        }
    }

    #[test]
    fn test_validate_card_info() {
        assert!(validate_card_info(&info()).is_ok());

        let mut bad = info();
        bad.card_code = "  ".to_string();
        assert!(matches!(validate_card_info(&bad), Err(ApiError::InvalidInput(_))));

        let mut bad = info();
        bad.valid_to = NaiveDate::from_ymd_opt(2025, 12, 31);
        assert!(validate_card_info(&bad).is_err());

        let mut bad = info();
        bad.carrier_id = 0;
        assert!(validate_card_info(&bad).is_err());
    }
}
