/// Runtime settings for the web server, filled from the `serve` command line.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Materials per page in the material list
    pub page_size: u64,
    /// Username whose materials every user can see
    pub public_owner: String,
    /// Request header carrying the authenticated username
    pub identity_header: String,
    /// Username assumed when the identity header is missing (development only)
    pub dev_user: Option<String>,
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            public_owner: "public".to_string(),
            identity_header: "x-remote-user".to_string(),
            dev_user: None,
            cors_origin: None,
        }
    }
}
