// ==========================================
// 尾程运价引擎 - 分区解析
// ==========================================
// 职责: 目的地（邮编/国家）→ 承运商分区
// 规则: 按 priority、zone_code 顺序遍历；先整轮匹配邮编前缀，再整轮匹配国家
//       前缀不比较长短，首个命中即返回（分区顺序由配置方维护）
// ==========================================

use crate::domain::zone::{normalize_country_code, normalize_postal_code, Zone};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 命中方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneMatchKind {
    PostalPrefix,
    Country,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneMatch<'a> {
    pub zone: &'a Zone,
    pub kind: ZoneMatchKind,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ZoneResolver;

impl ZoneResolver {
    pub fn new() -> Self {
        Self
    }

    /// 解析目的地所属分区
    ///
    /// # 返回
    /// - Some(ZoneMatch): 命中的分区及命中方式
    /// - None: 无任何分区匹配
    pub fn resolve<'a>(
        &self,
        zones: &'a [Zone],
        postal_code: Option<&str>,
        country_code: Option<&str>,
    ) -> Option<ZoneMatch<'a>> {
        let mut ordered: Vec<&Zone> = zones.iter().collect();
        ordered.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.zone_code.cmp(&b.zone_code))
        });

        let postal = postal_code.map(normalize_postal_code).unwrap_or_default();
        if !postal.is_empty() {
            if let Some(zone) = ordered.iter().find(|z| z.matches_postal(&postal)) {
                debug!(zone = %zone.zone_code, postal_code = %postal, "邮编前缀命中分区");
                return Some(ZoneMatch {
                    zone,
                    kind: ZoneMatchKind::PostalPrefix,
                });
            }
        }

        let country = country_code.map(normalize_country_code).unwrap_or_default();
        if !country.is_empty() {
            if let Some(zone) = ordered.iter().find(|z| z.matches_country(&country)) {
                debug!(zone = %zone.zone_code, country = %country, "国家代码命中分区");
                return Some(ZoneMatch {
                    zone,
                    kind: ZoneMatchKind::Country,
                });
            }
        }

        None
    }
}
