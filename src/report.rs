use serde::{Deserialize, Serialize};

/// External BI report shown in a fixed-size frame. The URL is passed through untouched
/// apart from query-parameter encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub base_url: String,
    pub report_id: String,
    pub auto_auth: bool,
    pub tenant_id: String,
    pub width: u32,
    pub height: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            base_url: "https://app.powerbi.com/reportEmbed".to_string(),
            report_id: "8dfeb7fc-42e5-453b-ac57-06eaf7511330".to_string(),
            auto_auth: true,
            tenant_id: "136fe6a7-243d-45b5-93a1-0ab9c53fb298".to_string(),
            width: 1200,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEmbed {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl ReportConfig {
    pub fn embed(&self) -> ReportEmbed {
        ReportEmbed {
            url: self.url(),
            width: self.width,
            height: self.height,
        }
    }

    pub fn url(&self) -> String {
        format!(
            "{}?reportId={}&autoAuth={}&ctid={}",
            self.base_url,
            urlencoding::encode(&self.report_id),
            self.auto_auth,
            urlencoding::encode(&self.tenant_id)
        )
    }
}

impl ReportEmbed {
    pub fn iframe_html(&self) -> String {
        format!(
            "<iframe src=\"{}\" width=\"{}\" height=\"{}\" frameborder=\"0\" allowFullScreen=\"true\"></iframe>",
            self.url.replace('&', "&amp;").replace('"', "&quot;"),
            self.width,
            self.height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::ReportConfig;

    #[test]
    fn default_url_carries_three_parameters() {
        let embed = ReportConfig::default().embed();
        assert_eq!(
            embed.url,
            "https://app.powerbi.com/reportEmbed?reportId=8dfeb7fc-42e5-453b-ac57-06eaf7511330&autoAuth=true&ctid=136fe6a7-243d-45b5-93a1-0ab9c53fb298"
        );
        assert_eq!((embed.width, embed.height), (1200, 720));
    }

    #[test]
    fn iframe_escapes_ampersands() {
        let html = ReportConfig::default().embed().iframe_html();
        assert!(html.contains("&amp;autoAuth=true"));
        assert!(html.contains("width=\"1200\" height=\"720\""));
    }

    #[test]
    fn identifiers_are_encoded() {
        let config = ReportConfig {
            report_id: "a b".to_string(),
            auto_auth: false,
            ..ReportConfig::default()
        };
        assert!(config.url().contains("reportId=a%20b&autoAuth=false"));
    }
}
