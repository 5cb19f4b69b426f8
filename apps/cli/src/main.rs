mod channels;

use std::path::{Path, PathBuf};

use analogtv_core::patterns::{smpte_colorbars, text_card};
use analogtv_core::signal::{TOP, VISLINES, VIS_LEN, VIS_START};
use analogtv_core::{
    AnalogTv, Canvas, ColorAllocator, EngineConfig, Feed, Font, Input, LimitedColormap, Logo,
    PixelFormat, RgbImage, Surface, TvControls,
};
use anyhow::{Context, Result};
use channels::{channel_table, pick_channel, turn_knobs};
use clap::Parser;
use image::imageops::{self, FilterType};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const FPS: usize = 30;
const FRAME_TIME: f64 = 1.0 / FPS as f64;
const STATIONS: usize = 6;
const COLORBARS_STATION: usize = 1;
/// Tuning noise samples after a channel switch.
const CHANNEL_CHANGE_CYCLES: usize = 200_000;

#[derive(Parser, Debug)]
#[command(author, version, about = "Analog television batch renderer")]
struct Args {
    #[arg(long, default_value_t = 640)]
    width: usize,
    #[arg(long, default_value_t = 480)]
    height: usize,
    #[arg(long, default_value_t = 30)]
    frames: usize,
    #[arg(long)]
    threads: Option<usize>,
    /// Receiver noise level on every channel.
    #[arg(long, default_value_t = 0.06)]
    noise: f64,
    #[arg(long)]
    seed: Option<u64>,
    /// Picture broadcast by a station. Repeat for more stations.
    #[arg(long = "image")]
    images: Vec<PathBuf>,
    /// PNG with alpha keyed over the color bars.
    #[arg(long)]
    logo: Option<PathBuf>,
    /// JSON file of TV controls.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(short, long, default_value = "analogtv.png")]
    output: PathBuf,
    /// Number of channels on the dial.
    #[arg(long, default_value_t = 12)]
    channels: usize,
    /// Switch to a random channel every N frames.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    channel_every: Option<u64>,
    /// Play the power-on animation starting at this many seconds.
    #[arg(long)]
    powerup: Option<f64>,
    /// Write every frame as a numbered PNG next to the output path.
    #[arg(long)]
    sequence: bool,
    /// Render through a 256-entry colormap.
    #[arg(long)]
    cmap: bool,
    /// Give the set a random worn-out horizontal hold and bottom squeeze.
    #[arg(long)]
    random_desync: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = EngineConfig {
        threads: args.threads,
        use_cmap: args.cmap,
        ..EngineConfig::default()
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config.pixel_format = if args.cmap {
        PixelFormat::indexed8()
    } else {
        PixelFormat::rgba32()
    };
    let mut rng = SmallRng::seed_from_u64(config.seed);

    let mut controls = load_controls(args.config.as_deref())?;
    if args.random_desync {
        controls.randomize_desync(&mut rng);
    }
    if args.channel_every.is_some() {
        turn_knobs(&mut controls, &mut rng);
    }

    let pictures = args
        .images
        .iter()
        .map(|path| load_picture(path))
        .collect::<Result<Vec<_>>>()?;
    let logo = args.logo.as_deref().map(load_logo).transpose()?;
    let font = Font::builtin();
    let mut stations = (0..STATIONS)
        .map(|n| build_station(n, &pictures, logo.as_ref(), &font, &mut rng))
        .collect::<Result<Vec<_>>>()?;
    let mut table = channel_table(&mut rng, args.channels.max(1), STATIONS, args.noise);

    let mut cmap = LimitedColormap::new(256);
    let colormap: Option<&mut dyn ColorAllocator> = if args.cmap { Some(&mut cmap) } else { None };
    let mut tv = AnalogTv::new(config.clone(), controls, args.width, args.height, colormap)
        .context("Failed to create the TV")?;
    let mut canvas = Canvas::new(args.width, args.height, config.pixel_format);
    canvas.clear();
    let palette = args.cmap.then_some(&cmap);

    info!(
        width = args.width,
        height = args.height,
        frames = args.frames,
        stations = STATIONS,
        channels = table.len(),
        "rendering"
    );
    let mut current = 0;
    for frame in 0..args.frames {
        if let Some(every) = args.channel_every {
            if frame > 0 && frame as u64 % every == 0 {
                current = pick_channel(&mut rng, table.len());
                tv.change_channel(CHANNEL_CHANGE_CYCLES);
                if rng.gen_ratio(1, 5) {
                    turn_knobs(tv.controls_mut(), &mut rng);
                }
                debug!(frame, channel = current, "channel change");
            }
        }
        if frame > 0 && frame % FPS == 0 {
            stations[COLORBARS_STATION] = colorbars(logo.as_ref(), &mut rng);
        }
        if let Some(start) = args.powerup {
            tv.set_powerup(start + frame as f64 * FRAME_TIME);
        }

        let channel = &mut table[current];
        for tuning in &mut channel.tunings {
            tuning.reception.update(&mut rng);
        }
        let feeds: Vec<Feed<'_>> = channel
            .tunings
            .iter()
            .map(|t| Feed::new(&stations[t.station], &t.reception))
            .collect();
        tv.draw(channel.noise_level, &feeds, &mut canvas);
        for tuning in &mut channel.tunings {
            tuning.reception.advance();
        }

        if args.sequence {
            save_frame(&canvas, palette, &frame_path(&args.output, frame))?;
        }
        debug!(frame, "frame done");
    }

    if !args.sequence {
        save_frame(&canvas, palette, &args.output)?;
        info!(output = %args.output.display(), "saved");
    } else {
        info!(frames = args.frames, "saved sequence");
    }
    Ok(())
}

fn load_controls(path: Option<&Path>) -> Result<TvControls> {
    let Some(path) = path else {
        return Ok(TvControls::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read controls '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid controls in '{}'", path.display()))
}

fn load_picture(path: &Path) -> Result<image::RgbImage> {
    let picture = image::open(path)
        .with_context(|| format!("Cannot open image '{}'", path.display()))?
        .to_rgb8();
    let (w, h) = picture.dimensions();
    let (cw, ch) = ((f64::from(w) * 0.815) as u32, (f64::from(h) * 0.970) as u32);
    debug!(path = %path.display(), w, h, "loaded station picture");
    Ok(imageops::crop_imm(&picture, (w - cw) / 2, (h - ch) / 2, cw, ch).to_image())
}

fn load_logo(path: &Path) -> Result<Logo> {
    let picture = image::open(path)
        .with_context(|| format!("Cannot open logo '{}'", path.display()))?
        .to_rgba8();
    let (w, h) = picture.dimensions();
    let columns = (VIS_LEN as f64 * 0.35 / 4.0) as u32;
    // A logo pixel is four samples wide and one line tall.
    let pixel_aspect = 4.0 * (4.0 / 3.0) * VISLINES as f64 / VIS_LEN as f64;
    let lines = ((f64::from(columns) * f64::from(h) / f64::from(w.max(1)) * pixel_aspect) as u32).max(1);
    let scaled = imageops::resize(&picture, columns, lines, FilterType::Triangle);
    Ok(Logo::from_rgba(columns as usize, lines as usize, scaled.as_raw())?)
}

fn colorbars(logo: Option<&Logo>, rng: &mut SmallRng) -> Input {
    let mut input = Input::new();
    smpte_colorbars(&mut input, rng);
    if let Some(logo) = logo {
        let left = VIS_START + VIS_LEN.saturating_sub(logo.width * 4) / 2;
        input.draw_logo(logo, left, TOP + VISLINES / 5);
    }
    input
}

fn build_station(
    n: usize,
    pictures: &[image::RgbImage],
    logo: Option<&Logo>,
    font: &Font,
    rng: &mut SmallRng,
) -> Result<Input> {
    if n == COLORBARS_STATION {
        return Ok(colorbars(logo, rng));
    }
    let mut input = Input::new();
    if pictures.is_empty() {
        text_card(&mut input, font, &["ANALOGTV", &format!("STATION {n}")]);
        return Ok(input);
    }

    let picture = &pictures[n.saturating_sub(1) % pictures.len()];
    input.setup_sync(true, rng.gen_ratio(1, 20));
    input
        .load_rgb(&RgbImage {
            width: picture.width() as usize,
            height: picture.height() as usize,
            data: picture.as_raw(),
        })
        .with_context(|| format!("Cannot encode picture for station {n}"))?;
    Ok(input)
}

fn frame_path(output: &Path, frame: usize) -> PathBuf {
    let stem = output.file_stem().map_or_else(|| "frame".into(), |s| s.to_string_lossy());
    let ext = output.extension().map_or_else(|| "png".into(), |s| s.to_string_lossy());
    output.with_file_name(format!("{stem}.{frame:06}.{ext}"))
}

fn save_frame(canvas: &Canvas, palette: Option<&LimitedColormap>, path: &Path) -> Result<()> {
    let rgb = match palette {
        Some(cmap) => indexed_to_rgb8(canvas, cmap),
        None => canvas.to_rgb8(),
    };
    image::RgbImage::from_raw(canvas.width as u32, canvas.height as u32, rgb)
        .context("Failed to create output image")?
        .save(path)
        .with_context(|| format!("Cannot save image '{}'", path.display()))
}

fn indexed_to_rgb8(canvas: &Canvas, cmap: &LimitedColormap) -> Vec<u8> {
    let mut out = Vec::with_capacity(canvas.width * canvas.height * 3);
    for y in 0..canvas.height {
        for x in 0..canvas.width {
            let rgb = cmap.color(canvas.pixel(x, y)).unwrap_or([0; 3]);
            out.extend(rgb.map(|c| (c >> 8) as u8));
        }
    }
    out
}
