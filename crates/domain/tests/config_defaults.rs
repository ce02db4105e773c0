use mh_domain::config::Config;

#[test]
fn empty_file_uses_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert!(config.mcp.servers.is_empty());
    assert_eq!(config.mcp.request_timeout_ms, 60_000);
    assert_eq!(config.llm.provider.api_key_env, "ANTHROPIC_API_KEY");
    assert_eq!(config.chat.document_index_uri, "docs://documents");
    assert_eq!(config.chat.document_uri_prefix, "docs://documents/");
    assert_eq!(config.chat.max_tool_rounds, 8);
}

#[test]
fn servers_keep_file_order() {
    let toml_str = r#"
[[mcp.servers]]
id = "docs"
command = "uv"
args = ["run", "mcp_server.py"]

[[mcp.servers]]
id = "videos"
command = "uv"
args = ["run", "video_server.py"]
roots = ["/tmp/videos"]
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let ids: Vec<&str> = config.mcp.servers.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["docs", "videos"]);
    assert!(config.mcp.servers[0].roots.is_none());
    assert_eq!(config.mcp.servers[1].roots.as_deref(), Some(&["/tmp/videos".to_string()][..]));
}

#[test]
fn server_env_parses() {
    let toml_str = r#"
[[mcp.servers]]
id = "docs"
command = "node"
args = ["server.js"]
env = { NODE_ENV = "production" }
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.mcp.servers[0].env.get("NODE_ENV").unwrap(), "production");
}

#[test]
fn validate_rejects_duplicate_ids() {
    let toml_str = r#"
[[mcp.servers]]
id = "docs"
command = "a"

[[mcp.servers]]
id = "docs"
command = "b"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("duplicate MCP server id 'docs'"));
}

#[test]
fn validate_rejects_unknown_document_server() {
    let toml_str = r#"
[chat]
document_server = "missing"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn validate_accepts_known_document_server() {
    let toml_str = r#"
[chat]
document_server = "docs"

[[mcp.servers]]
id = "docs"
command = "uv"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert!(config.validate().is_ok());
}
