// ==========================================
// 尾程运价引擎 - 表格读取器实现
// ==========================================
// 职责: 上传文件 → RawTable（表头猜测 + 补齐列宽），不含业务知识
// 支持: CSV (.csv) / Excel (.xlsx/.xlsm/.xls/.xlsb/.ods) / OCR (.pdf/.png/.jpg/.tif)
// ==========================================

use crate::domain::table::{DataRow, HeaderCell, RawTable};
use crate::domain::types::SourceKind;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::rate_importer_trait::TableReader;
use async_trait::async_trait;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::ReaderBuilder;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 表头猜测扫描的最大行数
const HEADER_SCAN_ROWS: usize = 10;

const EXCEL_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xls", "xlsb", "ods"];
const OCR_EXTENSIONS: [&str; 6] = ["pdf", "png", "jpg", "jpeg", "tif", "tiff"];

/// 取小写扩展名
pub fn file_extension(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

// ==========================================
// 原始单元格矩阵 → RawTable
// ==========================================

/// 由单元格矩阵构建 RawTable
///
/// # 规则
/// - 全空行跳过
/// - 表头 = 前 10 个非空行中第一个至少含 2 个非空单元格的行，否则取第一个非空行
/// - 表头之上的标题行丢弃
/// - 各行补齐到表头宽度（取全表最宽者），空表头命名为 "Column N"
pub fn build_raw_table(
    matrix: Vec<Vec<String>>,
    source: SourceKind,
    ocr_confidence: Option<f64>,
    file_name: &str,
) -> ImportResult<RawTable> {
    let rows: Vec<(usize, Vec<String>)> = matrix
        .into_iter()
        .enumerate()
        .map(|(i, cells)| (i + 1, cells.into_iter().map(|c| c.trim().to_string()).collect::<Vec<_>>()))
        .filter(|(_, cells)| cells.iter().any(|c| !c.is_empty()))
        .collect();

    if rows.is_empty() {
        return Err(ImportError::EmptyTable(file_name.to_string()));
    }

    let header_pos = rows
        .iter()
        .take(HEADER_SCAN_ROWS)
        .position(|(_, cells)| cells.iter().filter(|c| !c.is_empty()).count() >= 2)
        .unwrap_or(0);

    let width = rows[header_pos..]
        .iter()
        .map(|(_, cells)| {
            cells
                .iter()
                .rposition(|c| !c.is_empty())
                .map(|p| p + 1)
                .unwrap_or(0)
        })
        .max()
        .unwrap_or(0);

    let mut iter = rows.into_iter().skip(header_pos);
    let (header_row_number, mut header_cells) = match iter.next() {
        Some(h) => h,
        None => return Err(ImportError::EmptyTable(file_name.to_string())),
    };
    header_cells.resize(width, String::new());

    let headers = header_cells
        .into_iter()
        .enumerate()
        .map(|(index, raw)| HeaderCell {
            index,
            label: if raw.is_empty() {
                format!("Column {}", index + 1)
            } else {
                raw.clone()
            },
            raw,
        })
        .collect();

    let data_rows = iter
        .map(|(row_number, mut cells)| {
            cells.resize(width, String::new());
            DataRow { row_number, cells }
        })
        .collect::<Vec<_>>();

    debug!(
        header_row = header_row_number,
        width,
        rows = data_rows.len(),
        "表格结构"
    );

    Ok(RawTable {
        headers,
        rows: data_rows,
        header_row_number,
        source,
        ocr_confidence,
    })
}

// ==========================================
// CSV Reader 实现
// ==========================================
pub struct CsvTableReader;

impl CsvTableReader {
    /// 按首行出现次数选择分隔符（同数时优先逗号）
    fn sniff_delimiter(text: &str) -> u8 {
        let first_line = text.lines().next().unwrap_or("");
        [b'\t', b';', b',']
            .into_iter()
            .max_by_key(|d| first_line.bytes().filter(|b| b == d).count())
            .unwrap_or(b',')
    }

    pub fn parse(&self, bytes: &[u8], file_name: &str) -> ImportResult<RawTable> {
        let text = String::from_utf8_lossy(bytes);
        let text = text.trim_start_matches('\u{feff}');
        let delimiter = Self::sniff_delimiter(text);

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .delimiter(delimiter)
            .from_reader(text.as_bytes());

        let mut matrix = Vec::new();
        for result in reader.records() {
            let record = result?;
            matrix.push(record.iter().map(|v| v.to_string()).collect::<Vec<_>>());
        }

        build_raw_table(matrix, SourceKind::Csv, None, file_name)
    }
}

#[async_trait]
impl TableReader for CsvTableReader {
    async fn read_table(&self, bytes: &[u8], file_name: &str) -> ImportResult<RawTable> {
        self.parse(bytes, file_name)
    }
}

// ==========================================
// Excel Reader 实现
// ==========================================
pub struct ExcelTableReader;

impl ExcelTableReader {
    fn cell_text(cell: &Data) -> String {
        match cell {
            Data::Empty => String::new(),
            Data::String(s) => s.clone(),
            Data::Float(v) => v.to_string(),
            Data::Int(v) => v.to_string(),
            other => other.to_string(),
        }
    }

    /// 读取第一个非空工作表
    pub fn parse(&self, bytes: &[u8], file_name: &str) -> ImportResult<RawTable> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        let sheet_names = workbook.sheet_names();
        if sheet_names.is_empty() {
            return Err(ImportError::ExcelParseError("Excel 文件无工作表".to_string()));
        }

        for sheet_name in sheet_names {
            let range = workbook.worksheet_range(&sheet_name)?;
            if range.is_empty() {
                debug!(sheet = %sheet_name, "跳过空工作表");
                continue;
            }
            let matrix = range
                .rows()
                .map(|row| row.iter().map(Self::cell_text).collect::<Vec<_>>())
                .collect::<Vec<_>>();
            if matrix.iter().flatten().all(|c| c.trim().is_empty()) {
                continue;
            }
            debug!(sheet = %sheet_name, "读取工作表");
            return build_raw_table(matrix, SourceKind::Excel, None, file_name);
        }

        Err(ImportError::EmptyTable(file_name.to_string()))
    }
}

#[async_trait]
impl TableReader for ExcelTableReader {
    async fn read_table(&self, bytes: &[u8], file_name: &str) -> ImportResult<RawTable> {
        self.parse(bytes, file_name)
    }
}

// ==========================================
// OCR 服务（外部协作方）
// ==========================================

/// OCR 表格识别结果
#[derive(Debug, Clone, PartialEq)]
pub struct OcrTable {
    pub cells: Vec<Vec<String>>,
    pub confidence: f64,
}

/// 外部 OCR 表格识别服务
///
/// 重试/退避由服务自身负责，这里只调用一次
#[async_trait]
pub trait OcrService: Send + Sync {
    async fn recognize_table(&self, bytes: &[u8], file_name: &str) -> anyhow::Result<OcrTable>;
}

pub struct OcrTableReader {
    service: Arc<dyn OcrService>,
}

impl OcrTableReader {
    pub fn new(service: Arc<dyn OcrService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TableReader for OcrTableReader {
    async fn read_table(&self, bytes: &[u8], file_name: &str) -> ImportResult<RawTable> {
        let table = self
            .service
            .recognize_table(bytes, file_name)
            .await
            .map_err(|e| ImportError::OcrFailed(format!("{:#}", e)))?;
        info!(file_name, confidence = table.confidence, "OCR 识别完成");
        build_raw_table(
            table.cells,
            SourceKind::Ocr,
            Some(table.confidence.clamp(0.0, 1.0)),
            file_name,
        )
    }
}

// ==========================================
// 通用读取器（按扩展名分派 + 超时）
// ==========================================
pub struct UniversalTableReader {
    ocr: Option<Arc<dyn OcrService>>,
    timeout: Duration,
}

impl UniversalTableReader {
    pub fn new(ocr: Option<Arc<dyn OcrService>>, timeout: Duration) -> Self {
        Self { ocr, timeout }
    }

    async fn dispatch(&self, bytes: &[u8], file_name: &str) -> ImportResult<RawTable> {
        let ext = file_extension(file_name);

        if ext == "csv" || ext == "txt" {
            let bytes = bytes.to_vec();
            let name = file_name.to_string();
            return tokio::task::spawn_blocking(move || CsvTableReader.parse(&bytes, &name))
                .await
                .map_err(|e| ImportError::InternalError(e.to_string()))?;
        }

        if EXCEL_EXTENSIONS.contains(&ext.as_str()) {
            let bytes = bytes.to_vec();
            let name = file_name.to_string();
            return tokio::task::spawn_blocking(move || ExcelTableReader.parse(&bytes, &name))
                .await
                .map_err(|e| ImportError::InternalError(e.to_string()))?;
        }

        if OCR_EXTENSIONS.contains(&ext.as_str()) {
            return match &self.ocr {
                Some(service) => {
                    OcrTableReader::new(Arc::clone(service))
                        .read_table(bytes, file_name)
                        .await
                }
                None => Err(ImportError::OcrUnavailable(file_name.to_string())),
            };
        }

        Err(ImportError::UnsupportedFormat(ext))
    }
}

#[async_trait]
impl TableReader for UniversalTableReader {
    async fn read_table(&self, bytes: &[u8], file_name: &str) -> ImportResult<RawTable> {
        match tokio::time::timeout(self.timeout, self.dispatch(bytes, file_name)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(file_name, timeout_secs = self.timeout.as_secs(), "文件解析超时");
                Err(ImportError::ParseTimeout {
                    file_name: file_name.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_build_raw_table_skips_title_and_blank_rows() {
        let m = matrix(&[
            &["Tariff 2025", "", ""],
            &["", "", ""],
            &["Zone", "Weight", "Price"],
            &["A", "0-5", "5"],
            &["", "", ""],
            &["B", "0-5", "6", "note"],
        ]);
        let t = build_raw_table(m, SourceKind::Csv, None, "t.csv").unwrap();

        assert_eq!(t.header_row_number, 3);
        assert_eq!(t.headers.len(), 4);
        assert_eq!(t.headers[3].label, "Column 4");
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[0].row_number, 4);
        assert_eq!(t.rows[1].row_number, 6);
        assert_eq!(t.rows[0].cells.len(), 4);
    }

    #[test]
    fn test_build_raw_table_single_column_falls_back_to_first_row() {
        let m = matrix(&[&["only"], &["value"]]);
        let t = build_raw_table(m, SourceKind::Csv, None, "t.csv").unwrap();
        assert_eq!(t.header_row_number, 1);
        assert_eq!(t.rows.len(), 1);
    }

    #[test]
    fn test_build_raw_table_empty_is_error() {
        let m = matrix(&[&["", ""]]);
        let err = build_raw_table(m, SourceKind::Csv, None, "empty.csv").unwrap_err();
        assert!(matches!(err, ImportError::EmptyTable(_)));
    }

    #[test]
    fn test_csv_reader_matrix_layout() {
        let csv = ",Zone1,Zone2\n0-5,5.00,6.00\n5-10,8.00,9.50\n";
        let t = CsvTableReader.parse(csv.as_bytes(), "m.csv").unwrap();
        assert_eq!(t.headers[0].label, "Column 1");
        assert_eq!(t.headers[0].raw, "");
        assert_eq!(t.headers[2].label, "Zone2");
        assert_eq!(t.rows[1].cells, vec!["5-10", "8.00", "9.50"]);
    }

    #[test]
    fn test_csv_reader_bom_and_semicolon() {
        let csv = "\u{feff}Zone;Weight;Price\nA;0-5;\"1,50\"\n";
        let t = CsvTableReader.parse(csv.as_bytes(), "s.csv").unwrap();
        assert_eq!(t.headers[0].label, "Zone");
        assert_eq!(t.rows[0].cells[2], "1,50");
    }

    struct FixedOcr;

    #[async_trait]
    impl OcrService for FixedOcr {
        async fn recognize_table(&self, _bytes: &[u8], _name: &str) -> anyhow::Result<OcrTable> {
            Ok(OcrTable {
                cells: vec![
                    vec!["Zone".to_string(), "Weight".to_string(), "Price".to_string()],
                    vec!["A".to_string(), "0-5".to_string(), "4".to_string()],
                ],
                confidence: 0.82,
            })
        }
    }

    #[tokio::test]
    async fn test_universal_reader_routes_by_extension() {
        let reader = UniversalTableReader::new(None, Duration::from_secs(5));
        let t = reader.read_table(b"Zone,Price\nA,1\n", "rates.CSV").await.unwrap();
        assert_eq!(t.source, SourceKind::Csv);

        let err = reader.read_table(b"%PDF", "rates.pdf").await.unwrap_err();
        assert!(matches!(err, ImportError::OcrUnavailable(_)));

        let err = reader.read_table(b"", "rates.docx").await.unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(ext) if ext == "docx"));
    }

    #[tokio::test]
    async fn test_universal_reader_uses_ocr_service() {
        let reader = UniversalTableReader::new(Some(Arc::new(FixedOcr)), Duration::from_secs(5));
        let t = reader.read_table(b"img", "scan.png").await.unwrap();
        assert_eq!(t.source, SourceKind::Ocr);
        assert_eq!(t.ocr_confidence, Some(0.82));
        assert_eq!(t.rows.len(), 1);
    }

    struct SlowOcr;

    #[async_trait]
    impl OcrService for SlowOcr {
        async fn recognize_table(&self, _bytes: &[u8], _name: &str) -> anyhow::Result<OcrTable> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            anyhow::bail!("unreachable")
        }
    }

    #[tokio::test]
    async fn test_universal_reader_times_out() {
        let reader = UniversalTableReader::new(Some(Arc::new(SlowOcr)), Duration::from_millis(20));
        let err = reader.read_table(b"img", "scan.pdf").await.unwrap_err();
        assert!(matches!(err, ImportError::ParseTimeout { .. }));
    }
}
