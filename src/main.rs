// ==========================================
// 课表版本与局部重排引擎 - 命令行入口
// ==========================================
// 用法:
//   timetable-regen [--db <path>] <command> [args...]
//
// 命令:
//   snapshot <section_id>
//   versions <section_id>
//   compare <timetable_id> <v1> <v2> [top_n]
//   restore <timetable_id> <version> [notes]
//   register <request.json>
//   regenerate <request.json>
//   logs <timetable_id> [limit]
//
// 所有输出为 JSON (stdout), 日志输出到 stderr
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use timetable_regen::api::RegisterInitialRequest;
use timetable_regen::app::{get_default_db_path, AppState};
use timetable_regen::domain::RegenerationRequest;

const USAGE: &str = "用法: timetable-regen [--db <path>] <snapshot|versions|compare|restore|register|regenerate|logs> [args...]";

#[tokio::main]
async fn main() -> Result<()> {
    timetable_regen::logging::init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let db_path = match args.iter().position(|a| a == "--db") {
        Some(pos) => {
            if pos + 1 >= args.len() {
                bail!("--db 缺少路径参数");
            }
            let path = args.remove(pos + 1);
            args.remove(pos);
            path
        }
        None => get_default_db_path(),
    };

    let mut args = args.into_iter();
    let command = args.next().ok_or_else(|| anyhow!(USAGE))?;
    let rest: Vec<String> = args.collect();

    tracing::info!(db_path = %db_path, command = %command, "timetable-regen v{}", timetable_regen::VERSION);
    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;
    let api = state.timetable_api.clone();

    match command.as_str() {
        "snapshot" => print_json(&api.get_snapshot(arg(&rest, 0, "section_id")?)?),
        "versions" => print_json(&api.get_versions(arg(&rest, 0, "section_id")?)?),
        "compare" => {
            let timetable_id = arg(&rest, 0, "timetable_id")?;
            let v1 = parse_arg::<i32>(&rest, 1, "version1")?;
            let v2 = parse_arg::<i32>(&rest, 2, "version2")?;
            let top_n = match rest.get(3) {
                Some(s) => Some(s.parse::<usize>().context("top_n 必须为非负整数")?),
                None => None,
            };
            print_json(&api.compare_versions(timetable_id, v1, v2, top_n)?)
        }
        "restore" => {
            let timetable_id = arg(&rest, 0, "timetable_id")?;
            let version = parse_arg::<i32>(&rest, 1, "version")?;
            let notes = rest.get(2).cloned();
            print_json(&api.restore_version(timetable_id, version, notes, "cli").await?)
        }
        "register" => {
            let request: RegisterInitialRequest = read_json(arg(&rest, 0, "request.json")?)?;
            print_json(&api.register_initial(request).await?)
        }
        "regenerate" => {
            let request: RegenerationRequest = read_json(arg(&rest, 0, "request.json")?)?;
            let scope = request.scope;
            print_json(&api.regenerate(scope, request).await?)
        }
        "logs" => {
            let timetable_id = arg(&rest, 0, "timetable_id")?;
            let limit = match rest.get(1) {
                Some(s) => s.parse::<usize>().context("limit 必须为非负整数")?,
                None => 50,
            };
            print_json(&api.list_action_logs(timetable_id, limit)?)
        }
        other => bail!("未知命令: {}\n{}", other, USAGE),
    }
}

fn arg<'a>(args: &'a [String], idx: usize, name: &str) -> Result<&'a str> {
    args.get(idx)
        .map(|s| s.as_str())
        .ok_or_else(|| anyhow!("缺少参数 <{}>\n{}", name, USAGE))
}

fn parse_arg<T>(args: &[String], idx: usize, name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    arg(args, idx, name)?
        .parse::<T>()
        .with_context(|| format!("参数 <{}> 格式错误", name))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("无法读取文件: {}", path))?;
    serde_json::from_str(&text).with_context(|| format!("JSON 解析失败: {}", path))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
