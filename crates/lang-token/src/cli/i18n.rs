use std::{env, path::Path, sync::OnceLock};

use crate::CoreError;
use anyhow::Error as AnyhowError;
use clap::{Command, builder::Arg};
use locale_config::Locale;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Language {
    English,
    SimplifiedChinese,
}

const PLACEHOLDER_PREFIX: &str = "i18n:";
const LANGUAGE_ENV_KEY: &str = "LANG_TOKEN_LANG";

static LANGUAGE: OnceLock<Language> = OnceLock::new();
static MESSAGES: OnceLock<Messages> = OnceLock::new();

fn interpolate(template: &str, values: &[(&str, String)]) -> String {
    let mut result = template.to_owned();
    for (key, value) in values {
        let placeholder = format!("{{{key}}}");
        result = result.replace(&placeholder, value);
    }
    result
}

pub fn language() -> Language {
    *LANGUAGE.get_or_init(detect_language)
}

pub fn messages() -> &'static Messages {
    MESSAGES.get_or_init(|| Messages { language: language() })
}

fn detect_language() -> Language {
    if let Ok(value) = env::var(LANGUAGE_ENV_KEY) {
        if let Some(lang) = parse_language_tag(&value) {
            return lang;
        }
    }

    let locale = Locale::user_default();
    for (_category, tag) in locale.tags() {
        if let Some(lang) = parse_language_tag(tag.as_ref()) {
            return lang;
        }
    }

    Language::English
}

fn parse_language_tag(raw: &str) -> Option<Language> {
    let mut normalized = raw
        .trim()
        .split('=')
        .next_back()
        .unwrap_or(raw)
        .replace('_', "-")
        .to_ascii_lowercase();

    if let Some(idx) = normalized.find('@') {
        normalized.truncate(idx);
    }
    if let Some(idx) = normalized.find('.') {
        normalized.truncate(idx);
    }

    if normalized.is_empty() {
        return None;
    }

    if normalized.starts_with("zh") {
        return Some(Language::SimplifiedChinese);
    }

    if normalized.starts_with("en") {
        return Some(Language::English);
    }

    None
}

pub struct Messages {
    language: Language,
}

impl Messages {
    pub fn for_language(language: Language) -> Self {
        Self { language }
    }

    pub fn error_prefix(&self) -> &'static str {
        self.text("errors.prefix")
    }

    pub fn workspace_already_initialized(&self, root: &Path) -> String {
        interpolate(self.text("init.workspace_exists"), &[("root", root.display().to_string())])
    }

    pub fn workspace_initialized(&self, root: &Path, sample: &Path) -> String {
        interpolate(
            self.text("init.workspace_created"),
            &[("root", root.display().to_string()), ("sample", sample.display().to_string())],
        )
    }

    pub fn config_written(&self, path: &Path) -> String {
        interpolate(self.text("init.config_written"), &[("path", path.display().to_string())])
    }

    pub fn no_documents(&self, dir: &Path) -> String {
        interpolate(self.text("files.empty"), &[("dir", dir.display().to_string())])
    }

    pub fn files_headers(&self) -> (&'static str, &'static str) {
        (self.text("files.header.name"), self.text("files.header.modified"))
    }

    pub fn reference_marker(&self) -> &'static str {
        self.text("files.reference_marker")
    }

    pub fn nothing_missing(&self, file: &str, reference: &str) -> String {
        interpolate(
            self.text("missing.none"),
            &[("file", file.to_string()), ("reference", reference.to_string())],
        )
    }

    pub fn missing_summary(&self, file: &str, count: usize, total: usize) -> String {
        interpolate(
            self.text("missing.summary"),
            &[
                ("file", file.to_string()),
                ("count", count.to_string()),
                ("total", total.to_string()),
            ],
        )
    }

    pub fn no_groups(&self) -> &'static str {
        self.text("groups.empty")
    }

    pub fn group_picture(&self, picture: &str) -> String {
        interpolate(self.text("groups.picture"), &[("picture", picture.to_string())])
    }

    pub fn missing_marker(&self) -> &'static str {
        self.text("groups.missing_marker")
    }

    pub fn token_saved(&self, key: &str, file: &str) -> String {
        interpolate(
            self.text("set.saved"),
            &[("key", key.to_string()), ("file", file.to_string())],
        )
    }

    pub fn tokens_still_missing(&self, count: usize) -> String {
        interpolate(self.text("set.still_missing"), &[("count", count.to_string())])
    }

    pub fn exported(&self, file: &str, path: &Path) -> String {
        interpolate(
            self.text("save_as.done"),
            &[("file", file.to_string()), ("path", path.display().to_string())],
        )
    }

    pub fn picture_attached(&self, prefix: &str, picture: &str) -> String {
        interpolate(
            self.text("picture.attached"),
            &[("prefix", prefix.to_string()), ("picture", picture.to_string())],
        )
    }

    pub fn picture_name_invalid(&self, path: &Path) -> String {
        interpolate(
            self.text("errors.picture_name_invalid"),
            &[("path", path.display().to_string())],
        )
    }

    pub fn picture_read_failed(&self, path: &Path) -> String {
        interpolate(
            self.text("errors.picture_read_failed"),
            &[("path", path.display().to_string())],
        )
    }

    pub fn sample_write_failed(&self, path: &Path) -> String {
        interpolate(
            self.text("errors.sample_write_failed"),
            &[("path", path.display().to_string())],
        )
    }

    pub fn render_anyhow(&self, err: &AnyhowError) -> String {
        if let Some(core) = err.downcast_ref::<CoreError>() {
            return self.render_core_error(core);
        }
        for cause in err.chain().skip(1) {
            if let Some(core) = cause.downcast_ref::<CoreError>() {
                return self.render_core_error(core);
            }
        }
        err.to_string()
    }

    fn render_core_error(&self, error: &CoreError) -> String {
        let message = self.text(error.message_key());
        let placeholders = error.placeholders();
        interpolate(message, &placeholders)
    }

    fn text(&self, key: &str) -> &'static str {
        match self.language {
            Language::English => english_text(key),
            Language::SimplifiedChinese => zh_hans_text(key).unwrap_or_else(|| english_text(key)),
        }
    }

    pub fn translate_placeholder(&self, candidate: &str) -> Option<&'static str> {
        let key = candidate.trim().strip_prefix(PLACEHOLDER_PREFIX)?;
        Some(self.text(key))
    }
}

pub fn localize_command(mut command: Command, messages: &Messages) -> Command {
    if let Some(about) = command
        .get_about()
        .and_then(|styled| messages.translate_placeholder(&styled.to_string()))
    {
        command = command.about(about);
    }
    if let Some(long_about) = command
        .get_long_about()
        .and_then(|styled| messages.translate_placeholder(&styled.to_string()))
    {
        command = command.long_about(long_about);
    }

    command = command.mut_args(|arg| localize_arg(arg, messages));
    command = command.mut_subcommands(|sub| localize_command(sub, messages));
    command
}

fn localize_arg(mut arg: Arg, messages: &Messages) -> Arg {
    if let Some(help) = arg
        .get_help()
        .and_then(|styled| messages.translate_placeholder(&styled.to_string()))
    {
        arg = arg.help(help);
    }

    if let Some(long_help) = arg
        .get_long_help()
        .and_then(|styled| messages.translate_placeholder(&styled.to_string()))
    {
        arg = arg.long_help(long_help);
    }

    arg
}

fn english_text(key: &str) -> &'static str {
    match key {
        "cli.about" => "Compare translation files against a reference language and fill the gaps.",
        "cli.version_flag_help" => "Show version information and exit.",
        "cli.root_help" => "Override the root directory for all data.",
        "command.init.about" => "Initialize the workspace with a config and a sample reference.",
        "command.files.about" => "List the language documents in the workspace.",
        "command.missing.about" => "List reference tokens that are missing or empty in a file.",
        "command.groups.about" => "Show tokens grouped by their top-level namespace.",
        "command.set.about" => "Set one token in a language file and save it.",
        "command.save_as.about" => "Export a language file as nested JSON to a local path.",
        "command.picture.about" => "Attach a picture to a token group.",
        "command.serve.about" => "Start the HTTP file service used by the editor.",
        "args.file" => "Language document name, e.g. fr.json.",
        "args.json" => "Print JSON instead of text.",
        "args.missing_only" => "Only show tokens that are missing in the file.",
        "args.key" => "Dotted token key, e.g. home.title.",
        "args.value" => "New token value.",
        "args.save_as.path" => "Destination file for the exported document.",
        "args.picture.prefix" => "Group prefix (first key segment).",
        "args.picture.reference" => "Picture URL, or a local image path with --upload.",
        "args.picture.upload" => "Copy the local image into the workspace and reference it by URL.",
        "args.serve.bind" => "Bind address for the file service (default 127.0.0.1:3033).",
        "args.serve.auth_token" => {
            "Token clients must present (fallback env LANG_TOKEN_HTTP_TOKEN)."
        }
        "errors.prefix" => "Error:",
        "errors.sample_write_failed" => "Failed to write sample file {path}",
        "errors.picture_name_invalid" => "Cannot derive a file name from {path}",
        "errors.picture_read_failed" => "Failed to read picture {path}",
        "init.workspace_exists" => "Workspace {root} is already initialized.",
        "init.workspace_created" => {
            "Initialized workspace at {root}; sample reference written to {sample}."
        }
        "init.config_written" => "Wrote default config to {path}.",
        "files.empty" => "No language documents found in {dir}.",
        "files.header.name" => "FILE",
        "files.header.modified" => "MODIFIED",
        "files.reference_marker" => "(reference)",
        "missing.none" => "{file} has every token of {reference}.",
        "missing.summary" => "{count} of {total} tokens missing in {file}.",
        "groups.empty" => "No tokens to show.",
        "groups.picture" => "picture: {picture}",
        "groups.missing_marker" => "<missing>",
        "set.saved" => "Saved {key} in {file}.",
        "set.still_missing" => "{count} tokens still missing.",
        "save_as.done" => "Exported {file} to {path}.",
        "picture.attached" => "Attached picture {picture} to group {prefix}.",
        "core.invalid_document_name" => "Invalid document name '{name}'.",
        "core.document_not_found" => "Document '{name}' not found.",
        "core.no_document_selected" => "No target document is selected.",
        "core.reference_unavailable" => "Reference document '{name}' could not be loaded.",
        "core.reference_not_editable" => {
            "Reference document '{name}' is read-only; edit a target language instead."
        }
        "core.pictures_unavailable" => {
            "Picture metadata could not be loaded, refusing to overwrite it: {error}"
        }
        "core.create_dir_failed" => "Failed to create directory {path}: {error}",
        "core.read_dir_failed" => "Failed to read directory {path}: {error}",
        "core.read_file_failed" => "Failed to read {path}: {error}",
        "core.write_file_failed" => "Failed to write {path}: {error}",
        "core.parse_json_failed" => "Failed to parse JSON document at {path}: {error}",
        "core.serialise_json_failed" => "Failed to serialise JSON document: {error}",
        "core.parse_config_failed" => "Failed to parse config file {path}: {error}",
        "core.serialise_config_failed" => "Failed to serialise config to TOML: {error}",
        "core.invalid_public_url" => "Invalid public URL '{url}': {error}",
        "core.reference_name_empty" => "Reference document name cannot be empty.",
        "core.conflicting_key" => {
            "Token '{key}' conflicts with the existing structure at '{ancestor}'."
        }
        "core.home_dir_unknown" => "Unable to determine the user home directory (LANG_TOKEN_ROOT).",
        _ => panic!("missing English text for key '{key}'"),
    }
}

fn zh_hans_text(key: &str) -> Option<&'static str> {
    Some(match key {
        "cli.about" => "将翻译文件与参考语言对比并补全缺失的词条。",
        "cli.version_flag_help" => "显示版本信息并退出。",
        "cli.root_help" => "覆盖所有数据的根目录。",
        "command.init.about" => "初始化工作区，写入配置和示例参考文件。",
        "command.files.about" => "列出工作区中的语言文件。",
        "command.missing.about" => "列出文件中缺失或为空的参考词条。",
        "command.groups.about" => "按顶层命名空间分组显示词条。",
        "command.set.about" => "设置语言文件中的一个词条并保存。",
        "command.save_as.about" => "将语言文件以嵌套 JSON 导出到本地路径。",
        "command.picture.about" => "为词条分组关联图片。",
        "command.serve.about" => "启动编辑器使用的 HTTP 文件服务。",
        "args.file" => "语言文件名，例如 fr.json。",
        "args.json" => "以 JSON 格式输出。",
        "args.missing_only" => "只显示文件中缺失的词条。",
        "args.key" => "以点分隔的词条键，例如 home.title。",
        "args.value" => "新的词条内容。",
        "args.save_as.path" => "导出文件的目标路径。",
        "args.picture.prefix" => "分组前缀（键的第一段）。",
        "args.picture.reference" => "图片 URL；配合 --upload 时为本地图片路径。",
        "args.picture.upload" => "将本地图片复制到工作区并以 URL 引用。",
        "args.serve.bind" => "文件服务的监听地址（默认 127.0.0.1:3033）。",
        "args.serve.auth_token" => "客户端必须提供的令牌（可用环境变量 LANG_TOKEN_HTTP_TOKEN）。",
        "errors.prefix" => "错误：",
        "errors.sample_write_failed" => "写入示例文件 {path} 失败",
        "errors.picture_name_invalid" => "无法从 {path} 得到文件名",
        "errors.picture_read_failed" => "读取图片 {path} 失败",
        "init.workspace_exists" => "工作区 {root} 已初始化。",
        "init.workspace_created" => "已在 {root} 初始化工作区，示例参考文件写入 {sample}。",
        "init.config_written" => "已写入默认配置 {path}。",
        "files.empty" => "{dir} 中没有语言文件。",
        "files.header.name" => "文件",
        "files.header.modified" => "修改时间",
        "files.reference_marker" => "（参考）",
        "missing.none" => "{file} 包含 {reference} 的全部词条。",
        "missing.summary" => "{file} 缺失 {count}/{total} 个词条。",
        "groups.empty" => "没有可显示的词条。",
        "groups.picture" => "图片：{picture}",
        "groups.missing_marker" => "<缺失>",
        "set.saved" => "已在 {file} 中保存 {key}。",
        "set.still_missing" => "仍有 {count} 个词条缺失。",
        "save_as.done" => "已将 {file} 导出到 {path}。",
        "picture.attached" => "已为分组 {prefix} 关联图片 {picture}。",
        "core.invalid_document_name" => "无效的文件名 '{name}'。",
        "core.document_not_found" => "未找到文件 '{name}'。",
        "core.no_document_selected" => "尚未选择目标语言文件。",
        "core.reference_unavailable" => "无法加载参考文件 '{name}'。",
        "core.reference_not_editable" => "参考文件 '{name}' 为只读，请编辑目标语言文件。",
        "core.pictures_unavailable" => "无法加载图片信息，已拒绝覆盖：{error}",
        "core.create_dir_failed" => "创建目录 {path} 失败：{error}",
        "core.read_dir_failed" => "读取目录 {path} 失败：{error}",
        "core.read_file_failed" => "读取 {path} 失败：{error}",
        "core.write_file_failed" => "写入 {path} 失败：{error}",
        "core.parse_json_failed" => "解析 {path} 中的 JSON 文件失败：{error}",
        "core.serialise_json_failed" => "序列化 JSON 文件失败：{error}",
        "core.parse_config_failed" => "解析配置文件 {path} 失败：{error}",
        "core.serialise_config_failed" => "将配置序列化为 TOML 失败：{error}",
        "core.invalid_public_url" => "无效的公开地址 '{url}'：{error}",
        "core.reference_name_empty" => "参考文件名不能为空。",
        "core.conflicting_key" => "词条 '{key}' 与 '{ancestor}' 处已有的结构冲突。",
        "core.home_dir_unknown" => "无法确定用户主目录（LANG_TOKEN_ROOT）",
        other => return Some(english_text(other)),
    })
}
