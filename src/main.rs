//! Fleet Exec Agent - 主机集群远程操作执行核心
//!
//! Usage:
//! - Normal mode: `fleet-exec-agent`
//! - With custom port: `fleet-exec-agent --port 19999`

use fleet_exec_agent::RuntimeConfig;

/// 解析命令行参数
fn parse_args() -> RuntimeConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = RuntimeConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" if i + 1 < args.len() => {
                config.port_override = args[i + 1].parse().ok();
                i += 2;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                i += 1;
            }
        }
    }

    config
}

fn print_help() {
    println!("Fleet Exec Agent - remote operation executor");
    println!();
    println!("USAGE:");
    println!("    fleet-exec-agent [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --port <PORT>    Override the listening port");
    println!("    -h, --help       Print help information");
    println!();
    println!("ENVIRONMENT:");
    println!("    FLEET_HOSTS          Comma-separated registered hosts");
    println!("    FLEET_HOSTS_FILE     File with one registered host per line");
    println!("    FLEET_SSH_USER       Remote account (default: root)");
    println!("    RUST_LOG             Log filter (default: fleet_exec_agent=info,tower_http=info)");
}

fn main() {
    let config = parse_args();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    rt.block_on(async {
        fleet_exec_agent::init_and_run_agent_with_config(config).await;
    });
}
