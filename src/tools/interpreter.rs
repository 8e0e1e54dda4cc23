//! 代码解释器：在内嵌 Lua 5.4 中执行生成的程序并捕获 print 输出
//!
//! 每次 execute 都新建 Lua 状态与独立的环境表（命名空间），运行结束即丢弃。
//! 环境中只绑定白名单名称（print/len/str/int/float/list/dict/set/tuple 与纯计算的 Lua 库），
//! 不含 io/os/require/load/debug。
//!
//! 注意：白名单不是安全边界。解释器本身不限制内存、不做进程隔离，
//! 生产环境需要进程/容器级隔离；timeout_secs 只是可选的粗粒度截止时间。
//! 截止时间一旦触发即不可被 pcall 捕获：超时标志置位后，pcall 会重新抛出错误。

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mlua::{Function, HookTriggers, Lua, LuaOptions, StdLib, Table, Value, Variadic, VmState};
use serde_json::Value as JsonValue;

use crate::pipeline::ExecutionOutcome;
use crate::tools::Tool;

/// 从 Lua 基础库原样绑定的名称
const LUA_BASE_NAMES: &[&str] = &[
    "pairs", "ipairs", "next", "select", "type", "tostring", "tonumber", "error", "assert", "pcall",
];

/// 纯计算的 Lua 标准库
const LUA_LIBRARIES: &[&str] = &["string", "table", "math", "utf8"];

/// Python 风格的内置名称
const BUILTIN_NAMES: &[&str] = &[
    "print", "len", "str", "int", "float", "list", "dict", "set", "tuple",
];

/// 每执行多少条 VM 指令检查一次截止时间
const HOOK_INSTRUCTION_INTERVAL: u32 = 1000;

/// 程序在沙箱命名空间中运行时使用的 chunk 名
const CHUNK_NAME: &str = "task";

/// 包装原生 pcall：超时后捕获到的错误原样重新抛出
const GUARDED_PCALL: &str = r#"
local pcall, expired = ...
local function rethrow(ok, ...)
    if not ok and expired() then
        error(..., 0)
    end
    return ok, ...
end
return function(f, ...)
    return rethrow(pcall(f, ...))
end
"#;

#[derive(Debug, Clone, Default)]
pub struct CodeInterpreter {
    timeout: Option<Duration>,
}

impl CodeInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 0 表示不设截止时间
    pub fn with_timeout_secs(timeout_secs: u64) -> Self {
        Self {
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// 执行程序文本；任何 Lua 错误（语法或运行时）都转为失败结果，不向上返回错误
    pub fn execute(&self, source_code: &str) -> ExecutionOutcome {
        tracing::info!(bytes = source_code.len(), "Executing generated code");
        let output = Arc::new(Mutex::new(String::new()));

        let result = self.run(source_code, Arc::clone(&output));
        let captured = output
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default();

        match result {
            Ok(variables) => ExecutionOutcome::success(source_code, captured, variables),
            Err(e) => {
                tracing::warn!(error = %e, "Generated code raised an error");
                ExecutionOutcome::failure(source_code, captured, e.to_string())
            }
        }
    }

    /// 在阻塞线程池中执行，不占用 async 运行时线程；外层的 tokio 超时因此可以生效
    pub async fn execute_blocking(&self, source_code: &str) -> ExecutionOutcome {
        let interpreter = self.clone();
        let code = source_code.to_string();
        match tokio::task::spawn_blocking(move || interpreter.execute(&code)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Interpreter task aborted");
                ExecutionOutcome::failure(
                    source_code,
                    String::new(),
                    format!("Interpreter task aborted: {e}"),
                )
            }
        }
    }

    fn run(
        &self,
        source_code: &str,
        output: Arc<Mutex<String>>,
    ) -> mlua::Result<BTreeMap<String, String>> {
        let lua = Lua::new_with(
            StdLib::STRING | StdLib::TABLE | StdLib::MATH | StdLib::UTF8,
            LuaOptions::default(),
        )?;

        let expired = Arc::new(AtomicBool::new(false));
        if let Some(limit) = self.timeout {
            let deadline = Instant::now() + limit;
            let flag = Arc::clone(&expired);
            lua.set_hook(
                HookTriggers::new().every_nth_instruction(HOOK_INSTRUCTION_INTERVAL),
                move |_lua, _debug| {
                    if flag.load(Ordering::Relaxed) || Instant::now() >= deadline {
                        flag.store(true, Ordering::Relaxed);
                        Err(deadline_error(limit))
                    } else {
                        Ok(VmState::Continue)
                    }
                },
            );
        }

        let env = build_namespace(&lua, output, Arc::clone(&expired))?;
        lua.load(source_code)
            .set_name(CHUNK_NAME)
            .set_environment(env.clone())
            .exec()?;

        if expired.load(Ordering::Relaxed) {
            return Err(deadline_error(self.timeout.unwrap_or_default()));
        }
        collect_variables(&lua, &env)
    }
}

fn deadline_error(limit: Duration) -> mlua::Error {
    mlua::Error::runtime(format!("execution exceeded {}s time limit", limit.as_secs()))
}

fn build_namespace(
    lua: &Lua,
    output: Arc<Mutex<String>>,
    expired: Arc<AtomicBool>,
) -> mlua::Result<Table> {
    let globals = lua.globals();
    let env = lua.create_table()?;

    for name in LUA_BASE_NAMES.iter().chain(LUA_LIBRARIES) {
        env.set(*name, globals.get::<Value>(*name)?)?;
    }

    let expired_fn = lua.create_function(move |_, ()| Ok(expired.load(Ordering::Relaxed)))?;
    let pcall: Function = lua
        .load(GUARDED_PCALL)
        .set_name("pcall")
        .call((globals.get::<Function>("pcall")?, expired_fn))?;
    env.set("pcall", pcall)?;

    env.set("print", create_print(lua, output)?)?;
    env.set("str", globals.get::<Function>("tostring")?)?;
    env.set("len", lua.create_function(builtin_len)?)?;
    env.set("int", lua.create_function(builtin_int)?)?;
    env.set("float", lua.create_function(builtin_float)?)?;
    env.set("list", lua.create_function(builtin_list)?)?;
    env.set("tuple", lua.create_function(builtin_list)?)?;
    env.set("dict", lua.create_function(builtin_dict)?)?;
    env.set("set", lua.create_function(builtin_set)?)?;

    Ok(env)
}

/// print：参数以空格连接并追加换行，写入本次运行的缓冲区
fn create_print(lua: &Lua, output: Arc<Mutex<String>>) -> mlua::Result<Function> {
    lua.create_function(move |lua, args: Variadic<Value>| {
        let tostring: Function = lua.globals().get("tostring")?;
        let mut parts = Vec::with_capacity(args.len());
        for value in args.iter() {
            parts.push(tostring.call::<String>(value.clone())?);
        }
        let mut buf = output
            .lock()
            .map_err(|_| mlua::Error::runtime("output buffer poisoned"))?;
        buf.push_str(&parts.join(" "));
        buf.push('\n');
        Ok(())
    })
}

fn builtin_len(_lua: &Lua, value: Value) -> mlua::Result<i64> {
    match value {
        Value::String(s) => Ok(s.to_string_lossy().chars().count() as i64),
        Value::Table(t) => Ok(t.pairs::<Value, Value>().count() as i64),
        other => Err(mlua::Error::runtime(format!(
            "object of type '{}' has no len()",
            other.type_name()
        ))),
    }
}

fn builtin_int(_lua: &Lua, value: Value) -> mlua::Result<i64> {
    match value {
        Value::Integer(i) => Ok(i),
        Value::Number(n) if n.is_finite() => Ok(n.trunc() as i64),
        Value::Boolean(b) => Ok(i64::from(b)),
        Value::String(s) => {
            let text = s.to_string_lossy();
            text.trim().parse::<i64>().map_err(|_| {
                mlua::Error::runtime(format!("invalid literal for int(): '{}'", text))
            })
        }
        other => Err(mlua::Error::runtime(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn builtin_float(_lua: &Lua, value: Value) -> mlua::Result<f64> {
    match value {
        Value::Integer(i) => Ok(i as f64),
        Value::Number(n) => Ok(n),
        Value::Boolean(b) => Ok(if b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let text = s.to_string_lossy();
            text.trim().parse::<f64>().map_err(|_| {
                mlua::Error::runtime(format!("could not convert string to float: '{}'", text))
            })
        }
        other => Err(mlua::Error::runtime(format!(
            "float() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

/// list(t) 复制序列部分；list(a, b, ...) 以参数构造序列。tuple 同义（不强制不可变）
fn builtin_list(lua: &Lua, args: Variadic<Value>) -> mlua::Result<Table> {
    let out = lua.create_table()?;
    if let [Value::Table(source)] = args.as_slice() {
        for value in source.clone().sequence_values::<Value>() {
            out.push(value?)?;
        }
        return Ok(out);
    }
    for value in args.iter() {
        out.push(value.clone())?;
    }
    Ok(out)
}

fn builtin_dict(lua: &Lua, source: Option<Table>) -> mlua::Result<Table> {
    let out = lua.create_table()?;
    if let Some(source) = source {
        for pair in source.pairs::<Value, Value>() {
            let (k, v) = pair?;
            out.set(k, v)?;
        }
    }
    Ok(out)
}

/// set(t)：以序列元素为键、true 为值
fn builtin_set(lua: &Lua, source: Option<Table>) -> mlua::Result<Table> {
    let out = lua.create_table()?;
    if let Some(source) = source {
        for value in source.sequence_values::<Value>() {
            out.set(value?, true)?;
        }
    }
    Ok(out)
}

/// 程序定义的顶层名称（跳过 `_` 开头、绑定的内置名与函数值）
fn collect_variables(lua: &Lua, env: &Table) -> mlua::Result<BTreeMap<String, String>> {
    let tostring: Function = lua.globals().get("tostring")?;
    let mut variables = BTreeMap::new();
    for pair in env.clone().pairs::<Value, Value>() {
        let (key, value) = pair?;
        let Value::String(key) = key else { continue };
        let name = key.to_string_lossy().to_string();
        if name.starts_with('_') || is_bound_name(&name) || matches!(value, Value::Function(_)) {
            continue;
        }
        variables.insert(name, tostring.call::<String>(value)?);
    }
    Ok(variables)
}

fn is_bound_name(name: &str) -> bool {
    LUA_BASE_NAMES
        .iter()
        .chain(LUA_LIBRARIES)
        .chain(BUILTIN_NAMES)
        .any(|n| *n == name)
}

/// run_code 工具：把解释器暴露给工具注册表。Args: {"code": "..."}
pub struct RunCodeTool {
    interpreter: CodeInterpreter,
}

impl RunCodeTool {
    pub fn new(interpreter: CodeInterpreter) -> Self {
        Self { interpreter }
    }
}

#[async_trait]
impl Tool for RunCodeTool {
    fn name(&self) -> &str {
        "run_code"
    }

    fn description(&self) -> &str {
        "Run a Lua 5.4 program and capture its printed output. Args: {\"code\": \"program text\"}"
    }

    fn parameters_schema(&self) -> JsonValue {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": { "type": "string", "description": "Lua program to execute" }
            },
            "required": ["code"]
        })
    }

    async fn execute(&self, args: JsonValue) -> Result<String, String> {
        let code = args
            .get("code")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "Missing required argument: code".to_string())?;
        let outcome = self.interpreter.execute_blocking(code).await;
        serde_json::to_string(&outcome).map_err(|e| e.to_string())
    }
}
