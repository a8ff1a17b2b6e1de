use std::any::Any;
use std::env;
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use glam::Vec2;
use log::info;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use hero_scene::host::WindowHost;
use hero_scene::{HeadlessHost, HeroConfig, HeroVisualization, Host, HostSignal};

/// Pixels scrolled per wheel line, matching common browser defaults.
const LINE_HEIGHT_PX: f32 = 40.0;
const FRAME_INTERVAL_MS: f64 = 1000.0 / 60.0;

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let config = load_config(&options)?;

    if options.headless {
        return run_headless(&config, &options);
    }
    match run_interactive(config.clone(), &options) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --headless mode (set DISPLAY or install X11 libs to enable rendering)."
                );
                run_headless(&config, &options)
            } else {
                Err(err)
            }
        }
    }
}

fn load_config(options: &CliOptions) -> Result<HeroConfig> {
    let mut config = match &options.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            HeroConfig::from_xml(&text)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => HeroConfig::default(),
    };
    if options.seed.is_some() {
        config.seed = options.seed;
    }
    Ok(config)
}

/// Drives the visualization without a window: the pointer rests at the
/// centre and frames arrive at 60 Hz.
fn run_headless(config: &HeroConfig, options: &CliOptions) -> Result<()> {
    let host = HeadlessHost::new(options.width, options.height);
    let Some(visualization) = HeroVisualization::mount(host.clone(), config)? else {
        bail!("headless host has no mount target");
    };

    host.pointer_move(Vec2::new(
        options.width as f32 / 2.0,
        options.height as f32 / 2.0,
    ));
    if let Some(offset) = options.scroll {
        host.scroll(offset);
    }
    for frame in 0..options.frames {
        host.frame(frame as f64 * FRAME_INTERVAL_MS);
    }

    print_final_state(&visualization);
    visualization.unmount();
    println!(
        "Torn down: {} listener(s) remain, cursor={}",
        host.bus().listener_count(),
        host.cursor().as_css()
    );
    Ok(())
}

fn run_interactive(config: HeroConfig, options: &CliOptions) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = HeroApp::new(config, options.width, options.height);
    event_loop
        .run_app(&mut app)
        .map_err(|err| anyhow!("event loop failed: {err}"))?;

    if let Some(err) = app.error.take() {
        return Err(err);
    }
    Ok(())
}

struct HeroApp {
    config: HeroConfig,
    size: (u32, u32),
    host: Option<WindowHost>,
    visualization: Option<HeroVisualization<WindowHost>>,
    started: Instant,
    scroll: f32,
    error: Option<anyhow::Error>,
}

impl HeroApp {
    fn new(config: HeroConfig, width: u32, height: u32) -> Self {
        Self {
            config,
            size: (width, height),
            host: None,
            visualization: None,
            started: Instant::now(),
            scroll: 0.0,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for HeroApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.host.is_some() {
            return;
        }
        let attributes = Window::default_attributes()
            .with_title("Hero Scene")
            .with_transparent(true)
            .with_inner_size(LogicalSize::new(self.size.0 as f64, self.size.1 as f64));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                self.fail(event_loop, WindowInitError::from_error("window", err).into());
                return;
            }
        };

        let host = WindowHost::new(window);
        match HeroVisualization::mount(host.clone(), &self.config) {
            Ok(Some(visualization)) => {
                info!("rendering into window {:?}", host.window().id());
                self.visualization = Some(visualization);
            }
            Ok(None) => self.fail(event_loop, anyhow!("window reported no drawable area")),
            Err(err) => self.fail(event_loop, err.into()),
        }
        self.host = Some(host);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(host) = self.host.as_ref() else {
            return;
        };
        if window_id != host.window().id() {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                host.close();
                if let Some(visualization) = self.visualization.take() {
                    print_final_state(&visualization);
                    visualization.unmount();
                }
                event_loop.exit();
            }
            WindowEvent::CursorMoved { position, .. } => {
                let logical = position.to_logical::<f32>(host.window().scale_factor());
                host.dispatch(HostSignal::PointerMove {
                    client: Vec2::new(logical.x, logical.y),
                });
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let step = match delta {
                    MouseScrollDelta::LineDelta(_, lines) => -lines * LINE_HEIGHT_PX,
                    MouseScrollDelta::PixelDelta(position) => -position.y as f32,
                };
                self.scroll = (self.scroll + step).max(0.0);
                host.dispatch(HostSignal::Scroll {
                    offset: self.scroll,
                });
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                host.dispatch(HostSignal::Resize);
            }
            WindowEvent::RedrawRequested => {
                let timestamp_ms = self.started.elapsed().as_secs_f64() * 1000.0;
                host.dispatch(HostSignal::Frame { timestamp_ms });
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(host) = self.host.as_ref() {
            host.window().request_redraw();
        }
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

fn print_final_state<H: Host>(visualization: &HeroVisualization<H>) {
    println!("Frames rendered: {}", visualization.frames_rendered());
    visualization.with_scene(|scene| {
        let camera = &scene.camera;
        println!(
            "Camera pos=({:.2}, {:.2}, {:.2}) aspect={:.3}",
            camera.position.x, camera.position.y, camera.position.z, camera.aspect
        );
        let scroll = scene.scroll();
        println!(
            "Scroll target={:.1} smoothed={:.1}",
            scroll.target, scroll.smoothed
        );
        println!("Final shape states:");
        for shape in &scene.shapes {
            let position = shape.transform.position;
            println!(
                " - {} pos=({:.2}, {:.2}, {:.2}) opacity={:.2} emissive={:.2} scale={:.2} hovered={}",
                shape.name,
                position.x,
                position.y,
                position.z,
                shape.current.opacity,
                shape.current.emissive,
                shape.transform.scale.x,
                shape.is_hovered()
            );
        }
    });
}

const USAGE: &str = "Usage: hero-scene [--config <file.xml>] [--seed <n>] [--headless] \
[--frames <n>] [--width <px>] [--height <px>] [--scroll <px>]";

#[derive(Debug)]
struct CliOptions {
    config: Option<PathBuf>,
    seed: Option<u64>,
    headless: bool,
    frames: u32,
    width: u32,
    height: u32,
    scroll: Option<f32>,
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self {
            config: None,
            seed: None,
            headless: false,
            frames: 120,
            width: 1280,
            height: 720,
            scroll: None,
        };
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--headless" => options.headless = true,
                "--config" => options.config = Some(PathBuf::from(value(&mut args, &arg)?)),
                "--seed" => options.seed = Some(parse_value(&mut args, &arg)?),
                "--frames" => options.frames = parse_value(&mut args, &arg)?,
                "--width" => options.width = parse_value(&mut args, &arg)?,
                "--height" => options.height = parse_value(&mut args, &arg)?,
                "--scroll" => options.scroll = Some(parse_value(&mut args, &arg)?),
                "--help" | "-h" => bail!("{USAGE}"),
                other => bail!("Unknown argument: {other}. {USAGE}"),
            }
        }
        if options.width == 0 || options.height == 0 {
            bail!("--width and --height must be positive");
        }
        Ok(options)
    }
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| anyhow!("{flag} expects a value. {USAGE}"))
}

fn parse_value<T>(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = value(args, flag)?;
    raw.parse()
        .with_context(|| format!("invalid value '{raw}' for {flag}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliOptions> {
        CliOptions::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn defaults() {
        let options = parse(&[]).unwrap();
        assert!(!options.headless);
        assert_eq!(options.frames, 120);
        assert_eq!((options.width, options.height), (1280, 720));
        assert!(options.config.is_none());
    }

    #[test]
    fn parses_every_flag() {
        let options = parse(&[
            "--headless", "--seed", "9", "--frames", "30", "--width", "800", "--height", "600",
            "--scroll", "250", "--config", "hero.xml",
        ])
        .unwrap();
        assert!(options.headless);
        assert_eq!(options.seed, Some(9));
        assert_eq!(options.frames, 30);
        assert_eq!((options.width, options.height), (800, 600));
        assert_eq!(options.scroll, Some(250.0));
        assert_eq!(options.config, Some(PathBuf::from("hero.xml")));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&["--frames"]).is_err());
        assert!(parse(&["--frames", "many"]).is_err());
        assert!(parse(&["--width", "0"]).is_err());
        assert!(parse(&["--bogus"]).is_err());
    }
}
