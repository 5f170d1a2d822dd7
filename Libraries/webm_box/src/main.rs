use std::env;
use std::fs;
use std::process;

use webm_box::elements::tags::MatroskaTag;
use webm_box::elements::track_entry::TrackEntry;
use webm_box::reader::{parse_elements, parse_simple_block, read_uint, ParsedElement};
use webm_box::writer::{
    create_init_segment, ClusterWriter, AUDIO_TRACK_NUMBER, OPUS_CHANNELS, OPUS_SAMPLE_RATE,
    VIDEO_TRACK_NUMBER, VP9_CODEC_ID,
};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <webm_file> | --test", args[0]);
        process::exit(1);
    }

    if args[1] == "--test" {
        run_test_mode();
    } else {
        run_file_mode(&args[1]);
    }
}

fn run_file_mode(filename: &str) {
    let data = match fs::read(filename) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to read file '{}': {}", filename, e);
            process::exit(1);
        }
    };

    print_elements(filename, &data);
}

fn run_test_mode() {
    println!("Running in TEST mode...");

    let tracks = [
        TrackEntry::video(VIDEO_TRACK_NUMBER, VP9_CODEC_ID, 1280, 720),
        TrackEntry::opus(AUDIO_TRACK_NUMBER, OPUS_CHANNELS, OPUS_SAMPLE_RATE),
    ];

    // 1) Init segment
    let init_buffer = create_init_segment(&tracks);
    println!("Generated INIT segment ({} bytes)", init_buffer.len());
    print_elements("init", &init_buffer);

    // 2) One second of media: a keyframe every 15 video frames, 20 ms audio packets
    let mut video = ClusterWriter::new();
    let mut audio = ClusterWriter::new();
    let mut media_buffer = Vec::new();

    for frame in 0..30i64 {
        let bytes = video.append_simple_block(VIDEO_TRACK_NUMBER, frame * 33, &[0u8; 64], frame % 15 == 0);
        match bytes {
            Ok(b) => media_buffer.extend_from_slice(&b),
            Err(e) => {
                eprintln!("Failed to mux video frame {}: {}", frame, e);
                process::exit(1);
            }
        }
    }
    for packet in 0..50i64 {
        match audio.append_simple_block(AUDIO_TRACK_NUMBER, packet * 20, &[0u8; 16], true) {
            Ok(b) => media_buffer.extend_from_slice(&b),
            Err(e) => {
                eprintln!("Failed to mux audio packet {}: {}", packet, e);
                process::exit(1);
            }
        }
    }

    println!(
        "Generated MEDIA data ({} bytes, {} video clusters, {} audio clusters)",
        media_buffer.len(),
        video.clusters_started(),
        audio.clusters_started()
    );
    print_elements("media", &media_buffer);
}

fn print_elements(name: &str, data: &[u8]) {
    let elements = match parse_elements(data) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Failed to parse WebM elements: {}", e);
            process::exit(1);
        }
    };

    println!("Parsed {} elements from '{}':\n", elements.len(), name);
    for element in &elements {
        println!("{}", describe(element));
    }
    println!();
}

fn describe(element: &ParsedElement) -> String {
    let name = element
        .tag
        .map(|tag| format!("{:?}", tag))
        .unwrap_or_else(|| "Unknown".to_string());
    let size = element
        .size
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let header = format!(
        "@{:<8} {:<12} {:<20} size={}",
        element.offset,
        webm_box::format_element_id(element.id),
        name,
        size
    );

    match element.tag {
        Some(MatroskaTag::SimpleBlock) => match parse_simple_block(&element.data) {
            Ok(block) => format!("{} {:?}", header, block),
            Err(e) => format!("{} <{}>", header, e),
        },
        Some(
            MatroskaTag::DocType | MatroskaTag::CodecId | MatroskaTag::MuxingApp | MatroskaTag::WritingApp,
        ) => format!("{} \"{}\"", header, String::from_utf8_lossy(&element.data)),
        Some(tag) if !tag.is_master() && element.data.len() <= 8 && tag != MatroskaTag::SamplingFrequency => {
            format!("{} = {}", header, read_uint(&element.data))
        }
        _ if !element.is_master() => format!("{} {}", header, webm_box::format_capped_bytes(&element.data)),
        _ => header,
    }
}
