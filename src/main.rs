mod admin;
mod aliases;
mod app_service;
mod app_state;
mod commands;
mod config;
mod error;
mod search;
mod session;
mod ui;

use anyhow::Context;
use chrono::Local;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::app_service::AppService;
use crate::app_state::{App, AppEvent};
use crate::commands::AppCommand;
use crate::config::AppConfig;
use crate::session::{
    ApiTransport, AuthGate, AuthMarkerStore, AutoAuthSession, CommandTokenSource,
    FormularySession, HttpTransport,
};
use crate::ui::draw;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let ts = Local::now().format("%Y%m%d-%H%M%S").to_string();
    let log_dir = std::path::PathBuf::from("logs");
    std::fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join(format!("app-{}.log", ts));
    let log_file = std::fs::File::create(&log_path)?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file))) // 日志写文件，终端留给界面
        .filter_level(log::LevelFilter::Warn)
        .filter_module("formulary", log::LevelFilter::Info)
        .filter_module("reqwest", log::LevelFilter::Error)
        .init();

    let mut session_info = Vec::new();
    let current_dir = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
    session_info.push(format!("当前工作目录: {}", current_dir.display()));
    session_info.push(format!("日志文件: {}", log_path.display()));

    match dotenv::dotenv() {
        Ok(path) => session_info.push(format!("✓ 找到 .env 文件: {}", path.display())),
        Err(_) => session_info.push("⚠ 未找到 .env 文件，从系统环境变量读取".to_string()),
    }

    let config = AppConfig::from_env().context("读取配置失败")?;
    log::info!(
        "启动配置: api={} per_page={} auth={}",
        config.api_url,
        config.per_page,
        config.auth.is_some()
    );
    session_info.push(format!("API 地址: {}", config.api_url));
    session_info.push(format!("每页条数: {}", config.per_page));
    session_info.push(format!("下载目录: {}", config.download_dir.display()));

    let http: Arc<dyn ApiTransport> = Arc::new(
        HttpTransport::new(&config.api_url, config.timeout).context("创建 HTTP 客户端失败")?,
    );

    let gate = config.auth.as_ref().map(|auth| {
        let tokens = Arc::new(CommandTokenSource::new(
            auth.access_token.clone(),
            auth.token_command.clone(),
        ));
        Arc::new(AuthGate::new(tokens, AuthMarkerStore::new(&auth.state_path)))
    });
    match &gate {
        Some(gate) => {
            if gate.restore_session().await {
                session_info.push("✓ 已恢复上次的登录".to_string());
            } else {
                session_info.push("⚠ 未登录，可用 auth login 登录".to_string());
            }
        }
        None => session_info.push("未启用登录".to_string()),
    }

    let transport: Arc<dyn ApiTransport> = Arc::new(AutoAuthSession::new(http, gate.clone()));
    let session = Arc::new(FormularySession::new(transport, config.api_url.clone()));
    session_info.push("按 / 输入命令，help 查看可用命令".to_string());

    // 核心 Channel
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<AppCommand>();
    let (evt_tx, evt_rx) = mpsc::unbounded_channel::<AppEvent>();

    // 单后台任务模型 (Actor)
    let (service, done_rx) = AppService::new(
        session,
        gate,
        config.per_page,
        config.download_dir.clone(),
        evt_tx,
    );
    let service_handle = tokio::spawn(service.run(cmd_rx, done_rx));

    // 初始化终端
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(session_info, cmd_tx, evt_rx);
    let rx = app.evt_rx.take().context("事件通道已被取走")?;
    let res = run_app_loop(&mut terminal, &mut app, rx).await;

    // 恢复终端
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = &res {
        log::error!("界面循环异常退出: {}", e);
    }
    let _ = app.cmd_tx.send(AppCommand::Quit);
    drop(app);
    let _ = service_handle.await;
    res
}

/// 界面主循环：重绘、吸收后台事件、处理按键
async fn run_app_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut evt_rx: mpsc::UnboundedReceiver<AppEvent>,
) -> anyhow::Result<()> {
    loop {
        terminal.draw(|f| draw(f, app))?;

        while let Ok(event) = evt_rx.try_recv() {
            app.on_event(event);
        }

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_key_event(key.code) {
                    return Ok(());
                }
            }
        }
    }
}
