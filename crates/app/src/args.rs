//! Command line parsing.
//!
//! Accepted:
//!   [PATH] | --model=PATH
//!   --gpu-backend=auto|vulkan|dx12|metal|gl
//!   --size=WxH | --width=W | --height=H
//!   --spin=RAD_PER_SEC
//!
//! Malformed values fall back to the default and leave a warning behind.

use std::path::PathBuf;

use platform::ViewerConfig;

#[derive(Debug, Default)]
pub struct ViewerArgs {
    pub config: ViewerConfig,
    pub warnings: Vec<String>,
}

impl ViewerArgs {
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Self::default();
        let mut width: Option<u32> = None;
        let mut height: Option<u32> = None;

        for arg in args {
            let arg = arg.as_ref();
            if let Some(v) = arg.strip_prefix("--model=") {
                out.config.model = PathBuf::from(v);
            } else if let Some(v) = arg.strip_prefix("--gpu-backend=") {
                out.config.backends = out.backend(v);
            } else if let Some(v) = arg.strip_prefix("--size=") {
                match parse_size(v) {
                    Some((w, h)) => {
                        width = Some(w);
                        height = Some(h);
                    }
                    None => out.warn(format!("Invalid size '{v}', expected WxH")),
                }
            } else if let Some(v) = arg.strip_prefix("--width=") {
                match v.parse::<u32>() {
                    Ok(w) => width = Some(w),
                    Err(_) => out.warn(format!("Invalid width '{v}'")),
                }
            } else if let Some(v) = arg.strip_prefix("--height=") {
                match v.parse::<u32>() {
                    Ok(h) => height = Some(h),
                    Err(_) => out.warn(format!("Invalid height '{v}'")),
                }
            } else if let Some(v) = arg.strip_prefix("--spin=") {
                match v.parse::<f32>() {
                    Ok(s) if s.is_finite() => out.config.spin = s,
                    _ => out.warn(format!("Invalid spin '{v}'")),
                }
            } else if arg.starts_with("--") {
                out.warn(format!("Unknown flag '{arg}', ignoring"));
            } else {
                out.config.model = PathBuf::from(arg);
            }
        }

        if let Some(w) = width {
            out.config.width = w.max(1);
        }
        if let Some(h) = height {
            out.config.height = h.max(1);
        }
        out
    }

    fn backend(&mut self, val: &str) -> wgpu::Backends {
        match val.to_ascii_lowercase().as_str() {
            "auto" => wgpu::Backends::all(),
            "vulkan" | "vk" => wgpu::Backends::VULKAN,
            "dx12" | "d3d12" => wgpu::Backends::DX12,
            "metal" | "mtl" => wgpu::Backends::METAL,
            "gl" | "opengl" | "gles" => wgpu::Backends::GL,
            other => {
                self.warn(format!("Unknown backend '{other}', falling back to auto."));
                wgpu::Backends::all()
            }
        }
    }

    fn warn(&mut self, msg: String) {
        self.warnings.push(msg);
    }
}

fn parse_size(v: &str) -> Option<(u32, u32)> {
    let (w, h) = v.split_once('x').or_else(|| v.split_once('X'))?;
    Some((w.parse().ok()?, h.parse().ok()?))
}
