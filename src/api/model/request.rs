#[derive(Debug, Default, serde::Deserialize)]
pub struct StreamProxyRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct TitleQuery {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub url: String,
}
