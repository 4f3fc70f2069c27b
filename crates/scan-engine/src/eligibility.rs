//! 적격성 필터 -- 분석 대상 파일 판별
//!
//! 매니페스트 항목의 경로만 보고 오라클로 보낼 파일인지 결정하는 순수 함수입니다.
//! 파일 내용이나 파일시스템에 접근하지 않으며, 어떤 문자열에 대해서도 panic하지 않습니다.
//!
//! # 판별 순서
//!
//! 1. 디렉토리는 항상 제외
//! 2. 확장자 없는 허용 파일명 (`Dockerfile`, `Makefile` 등, 대소문자 무시)
//! 3. dotenv 파일 (`.env`, `.env.*`)
//! 4. 복합 확장자 (`tf.json`, `gradle.kts`, `yaml.tmpl`, `yml.tmpl`)
//! 5. 마지막 확장자가 허용 목록에 있으면 허용

use codewarden_core::types::ManifestEntry;

/// 확장자 없이 허용되는 파일명 (소문자)
pub const ALLOWED_FILENAMES: &[&str] = &[
    "dockerfile",
    "containerfile",
    "jenkinsfile",
    "makefile",
    "license",
    "licence",
    "changelog",
    "todo",
];

/// 허용 확장자 (소문자, 점 제외)
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    // 소스 코드
    "js", "jsx", "ts", "tsx", "mjs", "cjs", "vue", "svelte", "html", "htm", "css", "scss", "sass",
    "less", "php", "phtml", "php5", "py", "pyw", "rb", "java", "kt", "kts", "c", "h", "cpp", "hpp",
    "cc", "hh", "cs", "go", "rs", "swift", "dart", "sh", "bash", "zsh", "fish", "ps1", "psm1",
    "cmd", "bat", "pl", "pm", "lua", "r",
    // 설정 및 인프라
    "json", "jsonc", "json5", "yaml", "yml", "toml", "ini", "conf", "cfg", "properties", "env",
    "xml", "xsd", "xslt", "wsdl", "sql", "psql", "ddl", "dml", "graphql", "gql", "dockerfile",
    "containerfile", "tf", "tfvars", "hcl", "k8s", "kube", "cf", "cff", "groovy", "jenkinsfile",
    "gradle", "pom", "make", "mak", "mk", "makefile", "bazel", "bzl", "build",
    // 데이터 및 스키마
    "csv", "tsv", "parquet", "orc", "avsc", "proto", "thrift",
    // 템플릿
    "ejs", "erb", "mustache", "hbs", "liquid", "twig", "pug", "njk", "jinja", "smarty",
    // 문서
    "md", "markdown", "rst", "adoc", "txt", "log", "todo", "license", "licence", "changelog",
    // 키 및 인증서
    "pub", "pem", "cer", "crt", "csr",
];

/// 마지막 확장자만으로는 판별되지 않는 복합 확장자
pub const COMPOUND_SUFFIXES: &[&str] = &["tf.json", "gradle.kts", "yaml.tmpl", "yml.tmpl"];

/// 매니페스트 항목이 분석 대상인지 판별합니다.
pub fn is_eligible(entry: &ManifestEntry) -> bool {
    !entry.is_dir && is_eligible_path(&entry.path)
}

/// 경로 문자열만으로 분석 대상 여부를 판별합니다.
///
/// `/`와 `\` 모두 경로 구분자로 취급합니다.
pub fn is_eligible_path(path: &str) -> bool {
    let basename = path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(path)
        .to_lowercase();

    if basename.is_empty() {
        return false;
    }

    if ALLOWED_FILENAMES.contains(&basename.as_str()) {
        return true;
    }

    if basename == ".env" || basename.starts_with(".env.") {
        return true;
    }

    if COMPOUND_SUFFIXES.iter().any(|suffix| {
        basename
            .strip_suffix(suffix)
            .is_some_and(|stem| stem.len() > 1 && stem.ends_with('.'))
    }) {
        return true;
    }

    match basename.rsplit_once('.') {
        // `.bashrc`처럼 점으로 시작하는 숨김 파일은 확장자가 없는 것으로 취급
        Some((stem, ext)) if !stem.is_empty() => ALLOWED_EXTENSIONS.contains(&ext),
        _ => false,
    }
}
