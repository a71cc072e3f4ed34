use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "target_group", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TargetGroup {
    All,
    Vas,
    Businesses,
    Admins,
}

impl TargetGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetGroup::All => "all",
            TargetGroup::Vas => "vas",
            TargetGroup::Businesses => "businesses",
            TargetGroup::Admins => "admins",
        }
    }
}

impl std::fmt::Display for TargetGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AudienceError {
    #[error("filters {filters} do not apply to target group '{group}'")]
    MismatchedFilters {
        group: TargetGroup,
        filters: String,
    },
    #[error("empty value for filter '{0}'")]
    EmptyFilter(&'static str),
}

/// Raw broadcast filters as received from the admin request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BroadcastFilters {
    pub search_status: Option<String>,
    pub status: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
}

impl BroadcastFilters {
    fn va_fields(&self) -> bool {
        self.search_status.is_some() || self.status.is_some()
    }

    fn business_fields(&self) -> bool {
        self.industry.is_some() || self.company_size.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VaFilters {
    pub search_status: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BusinessFilters {
    pub industry: Option<String>,
    pub company_size: Option<String>,
}

/// Validated audience description, built from a target group plus raw
/// filters before any store query is constructed. Cross-group filters are
/// rejected instead of being silently ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum AudienceSelector {
    All,
    Vas(VaFilters),
    Businesses(BusinessFilters),
    Admins,
}

impl AudienceSelector {
    pub fn build(group: TargetGroup, filters: BroadcastFilters) -> Result<Self, AudienceError> {
        for (name, value) in [
            ("search_status", &filters.search_status),
            ("status", &filters.status),
            ("industry", &filters.industry),
            ("company_size", &filters.company_size),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(AudienceError::EmptyFilter(name));
            }
        }

        match group {
            TargetGroup::All | TargetGroup::Admins => {
                if filters.va_fields() || filters.business_fields() {
                    return Err(AudienceError::MismatchedFilters {
                        group,
                        filters: "profile filters".to_string(),
                    });
                }
                Ok(match group {
                    TargetGroup::All => AudienceSelector::All,
                    _ => AudienceSelector::Admins,
                })
            }
            TargetGroup::Vas => {
                if filters.business_fields() {
                    return Err(AudienceError::MismatchedFilters {
                        group,
                        filters: "industry/company_size".to_string(),
                    });
                }
                Ok(AudienceSelector::Vas(VaFilters {
                    search_status: filters.search_status,
                    status: filters.status,
                }))
            }
            TargetGroup::Businesses => {
                if filters.va_fields() {
                    return Err(AudienceError::MismatchedFilters {
                        group,
                        filters: "search_status/status".to_string(),
                    });
                }
                Ok(AudienceSelector::Businesses(BusinessFilters {
                    industry: filters.industry,
                    company_size: filters.company_size,
                }))
            }
        }
    }

    pub fn group(&self) -> TargetGroup {
        match self {
            AudienceSelector::All => TargetGroup::All,
            AudienceSelector::Vas(_) => TargetGroup::Vas,
            AudienceSelector::Businesses(_) => TargetGroup::Businesses,
            AudienceSelector::Admins => TargetGroup::Admins,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_all_without_filters() {
        let selector =
            AudienceSelector::build(TargetGroup::All, BroadcastFilters::default()).unwrap();
        assert_eq!(selector, AudienceSelector::All);
    }

    #[test]
    fn test_build_vas_with_filters() {
        let filters = BroadcastFilters {
            search_status: Some("actively_looking".to_string()),
            ..Default::default()
        };
        let selector = AudienceSelector::build(TargetGroup::Vas, filters).unwrap();

        match selector {
            AudienceSelector::Vas(f) => {
                assert_eq!(f.search_status.as_deref(), Some("actively_looking"));
                assert!(f.status.is_none());
            }
            other => panic!("unexpected selector: {other:?}"),
        }
    }

    #[test]
    fn test_build_rejects_cross_group_filters() {
        let filters = BroadcastFilters {
            industry: Some("fintech".to_string()),
            ..Default::default()
        };
        let err = AudienceSelector::build(TargetGroup::Vas, filters).unwrap_err();
        assert!(matches!(err, AudienceError::MismatchedFilters { .. }));
    }

    #[test]
    fn test_build_rejects_filters_for_all() {
        let filters = BroadcastFilters {
            status: Some("approved".to_string()),
            ..Default::default()
        };
        let err = AudienceSelector::build(TargetGroup::All, filters).unwrap_err();
        assert!(matches!(err, AudienceError::MismatchedFilters { .. }));
    }

    #[test]
    fn test_build_rejects_blank_filter_value() {
        let filters = BroadcastFilters {
            search_status: Some("  ".to_string()),
            ..Default::default()
        };
        let err = AudienceSelector::build(TargetGroup::Vas, filters).unwrap_err();
        assert_eq!(err, AudienceError::EmptyFilter("search_status"));
    }
}
