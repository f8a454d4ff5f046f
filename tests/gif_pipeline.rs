use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use image::{AnimationDecoder, Delay, Frame, Rgba, RgbaImage, codecs::gif::GifDecoder};
use maskframe::{CompositeMode, Job, Session, Settings, run_job};

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

fn fixture_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("gif_pipeline").join(name);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_canvas(path: &Path) {
    let frames = [RED, BLUE].map(|c| {
        Frame::from_parts(
            RgbaImage::from_pixel(8, 8, c),
            0,
            0,
            Delay::from_numer_denom_ms(70, 1),
        )
    });
    let f = File::create(path).unwrap();
    let mut enc = image::codecs::gif::GifEncoder::new(f);
    enc.set_repeat(image::codecs::gif::Repeat::Infinite)
        .unwrap();
    enc.encode_frames(frames).unwrap();
}

/// Left half opaque white, right half fully transparent.
fn write_mask(path: &Path) {
    let mask = RgbaImage::from_fn(8, 8, |x, _| {
        if x < 4 {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    mask.save_with_format(path, image::ImageFormat::Png)
        .unwrap();
}

fn decode_gif(path: &Path) -> Vec<Frame> {
    let f = BufReader::new(File::open(path).unwrap());
    GifDecoder::new(f)
        .unwrap()
        .into_frames()
        .collect_frames()
        .unwrap()
}

#[test]
fn cutout_job_punches_transparency_and_keeps_frame_count() {
    let dir = fixture_dir("cutout");
    let canvas = dir.join("canvas.gif");
    let mask = dir.join("mask.png");
    let out = dir.join("out.gif");
    let _ = std::fs::remove_file(&out);
    write_canvas(&canvas);
    write_mask(&mask);

    let report = run_job(&Job::new(&canvas, &mask, &out)).unwrap();
    assert_eq!(report.frames, 2);
    assert_eq!(report.size, maskframe::Size::new(8, 8).unwrap());

    let frames = decode_gif(&out);
    assert_eq!(frames.len(), 2);
    for frame in &frames {
        let (numer, denom) = frame.delay().numer_denom_ms();
        assert_eq!(numer / denom, 100);

        let buf = frame.buffer();
        assert_eq!(buf.dimensions(), (8, 8));
        assert_eq!(buf.get_pixel(0, 4)[3], 0);
        assert_eq!(buf.get_pixel(7, 4)[3], 255);
    }
    assert!(frames[0].buffer().get_pixel(7, 4)[0] > 200);
    assert!(frames[1].buffer().get_pixel(7, 4)[2] > 200);
}

#[test]
fn overlay_job_resizes_and_keeps_source_timing() {
    let dir = fixture_dir("overlay");
    let canvas = dir.join("canvas.gif");
    let mask = dir.join("mask.png");
    let out = dir.join("out.gif");
    let _ = std::fs::remove_file(&out);
    write_canvas(&canvas);
    write_mask(&mask);

    let mut job = Job::new(&canvas, &mask, &out);
    job.mode = CompositeMode::Overlay;
    job.size = Some(maskframe::Size::new(16, 1).unwrap());
    job.keep_source_timing = true;
    let report = run_job(&job).unwrap();
    assert_eq!(report.size, maskframe::Size::new(16, 16).unwrap());

    let frames = decode_gif(&out);
    assert_eq!(frames.len(), 2);
    for frame in &frames {
        let (numer, denom) = frame.delay().numer_denom_ms();
        assert_eq!(numer / denom, 70);

        let buf = frame.buffer();
        assert_eq!(buf.dimensions(), (16, 16));
        // White mask over the left half, canvas colour on the right.
        let left = buf.get_pixel(1, 8);
        assert!(left[0] > 200 && left[1] > 200 && left[2] > 200);
        assert_eq!(buf.get_pixel(15, 8)[3], 255);
    }
}

#[test]
fn job_file_paths_resolve_next_to_the_job() {
    let dir = fixture_dir("job_file");
    write_canvas(&dir.join("canvas.gif"));
    write_mask(&dir.join("mask.png"));
    let out = dir.join("out").join("result.gif");
    let _ = std::fs::remove_file(&out);

    let job_path = dir.join("job.json");
    std::fs::write(
        &job_path,
        r#"{ "canvas": "canvas.gif", "mask": "mask.png", "out": "out/result.gif", "flip": true }"#,
    )
    .unwrap();

    let job = Job::from_path(&job_path).unwrap();
    assert!(job.flip);
    let report = run_job(&job).unwrap();
    assert_eq!(report.out, out);
    assert!(out.exists());

    // Flipped: the opaque half of the mask now sits on the right.
    let frames = decode_gif(&out);
    assert_eq!(frames[0].buffer().get_pixel(7, 4)[3], 0);
    assert_eq!(frames[0].buffer().get_pixel(0, 4)[3], 255);
}

#[test]
fn session_drag_then_export_to_memory() {
    let dir = fixture_dir("session");
    let canvas = dir.join("canvas.gif");
    let mask = dir.join("mask.png");
    write_canvas(&canvas);
    write_mask(&mask);

    let mut session = Session::new(Settings::default());
    session.load_canvas(&canvas).unwrap();
    session.load_mask(&mask).unwrap();

    session.begin_resize().unwrap();
    session.update_resize(8, 0).unwrap();
    let size = session.commit_resize().unwrap();
    assert_eq!((size.width, size.height), (16, 16));

    session.apply().unwrap();
    let bytes = session.export_to(Vec::new()).unwrap();
    assert!(bytes.starts_with(b"GIF89a"));

    let frames = GifDecoder::new(std::io::Cursor::new(bytes))
        .unwrap()
        .into_frames()
        .collect_frames()
        .unwrap();
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|f| f.buffer().dimensions() == (16, 16)));
}

#[test]
fn apply_without_a_mask_is_rejected() {
    let dir = fixture_dir("no_mask");
    let canvas = dir.join("canvas.gif");
    write_canvas(&canvas);

    let mut session = Session::default();
    session.load_canvas(&canvas).unwrap();
    assert!(!session.can_apply());
    assert!(session.apply().is_err());
}
