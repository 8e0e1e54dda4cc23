//! Manus - 自主任务执行管线
//!
//! 入口：初始化日志、加载配置并构建 Agent；命令行参数作为任务（多个时批量执行），
//! 无参数时运行一个示例任务。结果以 JSON 打印，最后输出自我回顾建议。

use anyhow::Context;
use manus::core::create_agent_builder;
use manus::observability;
use manus::pipeline::TaskContext;

const DEMO_TASK: &str = "Compute the first 10 Fibonacci numbers and print them as a list";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let agent = create_agent_builder(None)
        .build()
        .context("Failed to build agent")?;

    let tasks: Vec<String> = std::env::args().skip(1).collect();
    let context = TaskContext::new();

    let results = match tasks.len() {
        0 => vec![agent.run_task(DEMO_TASK, &context).await],
        1 => vec![agent.run_task(&tasks[0], &context).await],
        _ => agent.run_batch(&tasks, &context).await,
    };

    for result in &results {
        let rendered =
            serde_json::to_string_pretty(result.as_ref()).context("Failed to render result")?;
        println!("{rendered}");
    }

    let stats = agent.stats();
    println!(
        "\n{} task(s), {} succeeded ({:.0}%)",
        stats.total,
        stats.successful,
        stats.success_rate * 100.0
    );

    let report = agent
        .self_improve()
        .await
        .context("Self-improvement review failed")?;
    println!("\nSelf-improvement suggestions:");
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to render report")?
    );

    Ok(())
}
