//! ### English
//! `DecodeEngine` backed by FFmpeg's send/receive decoding API (`ffmpeg` feature).
//!
//! ### 中文
//! 基于 FFmpeg send/receive 解码 API 的 `DecodeEngine`（`ffmpeg` feature）。

use std::collections::VecDeque;

use dpi::PhysicalSize;
use ffmpeg_next as ffmpeg;

use ffmpeg::codec::{self, decoder};
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling::{context::Context as ScalerContext, flag::Flags as ScalerFlags};
use ffmpeg::util::frame::video::Video as VideoFrame;

use crate::engine::frame::{PLANE_COUNT, PixelFormat, Plane, RawFrame};
use crate::engine::packet::CompressedUnit;

use super::submit::{self, SendReceive, SendStatus};
use super::{DecodeEngine, DecodeOutcome};

/// ### English
/// Software FFmpeg video decoder producing planar YUV frames.
///
/// Planar 4:2:0 / 4:2:2 / 4:4:4 output is copied as is; any other pixel format is converted
/// to YUV420P through the software scaler first.
///
/// ### 中文
/// 输出平面 YUV 帧的 FFmpeg 软件视频解码器。
///
/// 平面 4:2:0 / 4:2:2 / 4:4:4 输出直接拷贝；其他像素格式先经软件缩放器转换为 YUV420P。
pub struct FfmpegEngine {
    codec: FfmpegCodec,
    /// ### English
    /// Frames received while making room for input, handed out by later `decode` calls.
    ///
    /// ### 中文
    /// 为输入腾出空间时取出的帧，由之后的 `decode` 调用交付。
    ready: VecDeque<RawFrame>,
}

struct FfmpegCodec {
    decoder: decoder::Video,
    /// ### English
    /// Converter for non-planar output, rebuilt when the source format or size changes.
    ///
    /// ### 中文
    /// 非平面输出的转换器；源格式或尺寸变化时重建。
    scaler: Option<(ScalerContext, Pixel, u32, u32)>,
}

impl FfmpegEngine {
    fn with_decoder(decoder: decoder::Video) -> Self {
        Self {
            codec: FfmpegCodec {
                decoder,
                scaler: None,
            },
            ready: VecDeque::new(),
        }
    }

    /// ### English
    /// Opens a decoder for `codec_id` with default parameters.
    ///
    /// ### 中文
    /// 以默认参数为 `codec_id` 打开解码器。
    pub fn new(codec_id: codec::Id) -> Result<Self, String> {
        ffmpeg::init().map_err(|err| format!("Failed to initialize FFmpeg: {err}"))?;
        let codec = decoder::find(codec_id)
            .ok_or_else(|| format!("Decoder not found for {codec_id:?}"))?;
        let decoder = codec::context::Context::new_with_codec(codec)
            .decoder()
            .video()
            .map_err(|err| format!("Failed to open {codec_id:?} decoder: {err}"))?;
        Ok(Self::with_decoder(decoder))
    }

    /// ### English
    /// Opens a decoder from stream parameters supplied by the demuxer (extradata included).
    ///
    /// ### 中文
    /// 使用解复用器提供的流参数（包含 extradata）打开解码器。
    pub fn from_parameters(parameters: codec::Parameters) -> Result<Self, String> {
        ffmpeg::init().map_err(|err| format!("Failed to initialize FFmpeg: {err}"))?;
        let decoder = codec::context::Context::from_parameters(parameters)
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|err| format!("Failed to open decoder from parameters: {err}"))?;
        Ok(Self::with_decoder(decoder))
    }
}

fn is_again(err: &ffmpeg::Error) -> bool {
    matches!(err, ffmpeg::Error::Other { errno } if *errno == ffmpeg::util::error::EAGAIN)
}

impl FfmpegCodec {
    fn pixel_format(format: Pixel) -> Option<PixelFormat> {
        match format {
            Pixel::YUV420P | Pixel::YUVJ420P => Some(PixelFormat::Yuv420p),
            Pixel::YUV422P | Pixel::YUVJ422P => Some(PixelFormat::Yuv422p),
            Pixel::YUV444P | Pixel::YUVJ444P => Some(PixelFormat::Yuv444p),
            _ => None,
        }
    }

    fn convert(&mut self, frame: &VideoFrame) -> Result<RawFrame, String> {
        if let Some(format) = Self::pixel_format(frame.format()) {
            return Self::copy_frame(frame, format);
        }

        let (source, width, height) = (frame.format(), frame.width(), frame.height());
        let stale = !matches!(
            &self.scaler,
            Some((_, format, w, h)) if *format == source && *w == width && *h == height
        );
        if stale {
            tracing::debug!(?source, width, height, "converting decoder output to YUV420P");
            let context = ScalerContext::get(
                source,
                width,
                height,
                Pixel::YUV420P,
                width,
                height,
                ScalerFlags::BILINEAR,
            )
            .map_err(|err| format!("Failed to create scaler for {source:?}: {err}"))?;
            self.scaler = Some((context, source, width, height));
        }

        let Some((scaler, ..)) = self.scaler.as_mut() else {
            return Err("scaler unavailable".to_string());
        };
        let mut converted = VideoFrame::empty();
        scaler
            .run(frame, &mut converted)
            .map_err(|err| format!("Scaler run failed: {err}"))?;
        converted.set_pts(frame.pts());
        Self::copy_frame(&converted, PixelFormat::Yuv420p)
    }

    fn copy_frame(frame: &VideoFrame, format: PixelFormat) -> Result<RawFrame, String> {
        let size = PhysicalSize::new(frame.width(), frame.height());
        let layout = format.layout();

        let planes: [Plane; PLANE_COUNT] = std::array::from_fn(|index| {
            let plane_size = layout.plane_size(index, size);
            let stride = frame.stride(index) as u32;
            let len = stride as usize * plane_size.height as usize;
            let data = frame.data(index);
            Plane::new(
                data[..len.min(data.len())].to_vec(),
                plane_size.width,
                plane_size.height,
                stride,
            )
        });

        RawFrame::new(format, size, planes, frame.pts()).map_err(|err| err.to_string())
    }
}

impl SendReceive for FfmpegCodec {
    type Packet = ffmpeg::Packet;

    fn send(&mut self, packet: &ffmpeg::Packet) -> Result<SendStatus, String> {
        match self.decoder.send_packet(packet) {
            Ok(()) => Ok(SendStatus::Accepted),
            Err(err) if is_again(&err) => Ok(SendStatus::Full),
            Err(err) => Err(format!("send_packet failed: {err}")),
        }
    }

    fn receive(&mut self) -> Result<Option<RawFrame>, String> {
        let mut frame = VideoFrame::empty();
        match self.decoder.receive_frame(&mut frame) {
            Ok(()) => self.convert(&frame).map(Some),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(err) if is_again(&err) => Ok(None),
            Err(err) => Err(format!("receive_frame failed: {err}")),
        }
    }
}

impl DecodeEngine for FfmpegEngine {
    fn decode(&mut self, unit: &CompressedUnit) -> Result<DecodeOutcome, String> {
        let mut packet = ffmpeg::Packet::copy(unit.data());
        packet.set_pts(unit.timestamp());

        submit::submit(&mut self.codec, &packet, &mut self.ready)?;
        Ok(self
            .ready
            .pop_front()
            .map_or(DecodeOutcome::Pending, DecodeOutcome::Frame))
    }

    fn flush(&mut self) -> Result<Vec<RawFrame>, String> {
        let mut frames: Vec<RawFrame> = self.ready.drain(..).collect();
        self.codec
            .decoder
            .send_eof()
            .map_err(|err| format!("flush failed: {err}"))?;
        while let Some(frame) = self.codec.receive()? {
            frames.push(frame);
        }
        Ok(frames)
    }
}
