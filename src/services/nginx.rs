//! Nginx 站点目录脚手架
//!
//! 每个容器对应 `<config_root>/<name>` 与 `<content_root>/<name>` 两个目录，
//! 分别挂载到 `/etc/nginx/conf.d` 与 `/usr/share/nginx/html`

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 容器内的 Nginx 配置目录
pub const NGINX_CONF_MOUNT: &str = "/etc/nginx/conf.d";
/// 容器内的静态内容目录
pub const NGINX_HTML_MOUNT: &str = "/usr/share/nginx/html";

/// 单个站点的目录对
#[derive(Debug, Clone, PartialEq)]
pub struct SitePaths {
    pub config_dir: PathBuf,
    pub content_dir: PathBuf,
}

impl SitePaths {
    /// 生成 docker `-v` 绑定挂载参数（读写）
    pub fn bind_mounts(&self) -> [String; 2] {
        [
            format!("{}:{}", self.config_dir.display(), NGINX_CONF_MOUNT),
            format!("{}:{}", self.content_dir.display(), NGINX_HTML_MOUNT),
        ]
    }
}

/// 站点目录管理
#[derive(Debug, Clone)]
pub struct SiteDirectories {
    config_root: PathBuf,
    content_root: PathBuf,
}

impl SiteDirectories {
    pub fn new(config_root: impl Into<PathBuf>, content_root: impl Into<PathBuf>) -> Self {
        Self {
            config_root: config_root.into(),
            content_root: content_root.into(),
        }
    }

    /// 名称对应的目录（不检查是否存在）
    pub fn paths(&self, name: &str) -> SitePaths {
        SitePaths {
            config_dir: self.config_root.join(name),
            content_dir: self.content_root.join(name),
        }
    }

    /// 任一目录已存在
    pub async fn exists(&self, name: &str) -> bool {
        let paths = self.paths(name);
        for dir in [&paths.config_dir, &paths.content_dir] {
            if fs::try_exists(dir).await.unwrap_or(true) {
                return true;
            }
        }
        false
    }

    /// 创建目录（已存在时忽略），返回绝对路径
    pub async fn provision(&self, name: &str) -> io::Result<SitePaths> {
        let paths = self.paths(name);
        fs::create_dir_all(&paths.config_dir).await?;
        fs::create_dir_all(&paths.content_dir).await?;

        Ok(SitePaths {
            config_dir: fs::canonicalize(&paths.config_dir).await?,
            content_dir: fs::canonicalize(&paths.content_dir).await?,
        })
    }

    /// 写入默认 vhost 配置与占位首页
    pub async fn write_defaults(
        &self,
        paths: &SitePaths,
        name: &str,
        port: u16,
        server_ip: &str,
    ) -> io::Result<()> {
        fs::write(paths.config_dir.join("default.conf"), default_vhost()).await?;
        fs::write(
            paths.content_dir.join("index.html"),
            index_page(name, port, server_ip),
        )
        .await?;
        Ok(())
    }

    /// 删除名称对应的两个目录，不存在的目录直接跳过
    pub async fn remove(&self, name: &str) -> io::Result<()> {
        let paths = self.paths(name);
        remove_if_exists(&paths.config_dir).await?;
        remove_if_exists(&paths.content_dir).await?;
        Ok(())
    }
}

async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// 静态站点 vhost：监听 80，带 /health 与 5xx 错误页
pub fn default_vhost() -> String {
    format!(
        r#"server {{
    listen 80;
    server_name localhost;

    location / {{
        root {html};
        index index.html index.htm;
    }}

    # Health check endpoint
    location /health {{
        access_log off;
        return 200 "healthy\n";
        add_header Content-Type text/plain;
    }}

    error_page 500 502 503 504 /50x.html;
    location = /50x.html {{
        root {html};
    }}
}}
"#,
        html = NGINX_HTML_MOUNT
    )
}

/// 占位首页
pub fn index_page(name: &str, port: u16, server_ip: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{name} - Not a cPanel</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 40px; background: #f4f4f4; }}
        .container {{ background: white; padding: 20px; border-radius: 8px; }}
        .status {{ color: #28a745; font-weight: bold; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Container: {name}</h1>
        <p class="status">Container is running successfully!</p>
        <ul>
            <li><strong>Container Name:</strong> {name}</li>
            <li><strong>Port:</strong> {port}</li>
            <li><strong>Service Type:</strong> Nginx Web Server</li>
            <li><strong>Managed by:</strong> Not a cPanel</li>
        </ul>
        <p><a href="http://{server_ip}:5000" target="_blank">Access Control Panel</a></p>
    </div>
</body>
</html>
"#
    )
}
