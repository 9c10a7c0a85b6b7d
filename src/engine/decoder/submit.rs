//! ### English
//! Packet submission for send/receive style decoders.
//!
//! A decoder whose output queue is full refuses new input until a frame is received. The
//! refused packet is then sent again, so no compressed unit is skipped.
//!
//! ### 中文
//! send/receive 风格解码器的包提交逻辑。
//!
//! 输出队列已满的解码器会拒绝新输入，直到取走一帧。随后重新发送被拒绝的包，
//! 因此不会跳过任何压缩单元。

use std::collections::VecDeque;

use crate::engine::frame::RawFrame;

/// ### English
/// Answer of a decoder to one `send`.
///
/// ### 中文
/// 解码器对一次 `send` 的回应。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SendStatus {
    Accepted,
    /// ### English
    /// Output must be received before more input is accepted (`EAGAIN`).
    ///
    /// ### 中文
    /// 必须先取走输出才能接受更多输入（`EAGAIN`）。
    Full,
}

pub(crate) trait SendReceive {
    type Packet;

    fn send(&mut self, packet: &Self::Packet) -> Result<SendStatus, String>;

    /// ### English
    /// Receives one decoded frame; `None` when no output is available right now.
    ///
    /// ### 中文
    /// 取出一帧解码结果；当前没有输出时返回 `None`。
    fn receive(&mut self) -> Result<Option<RawFrame>, String>;
}

/// ### English
/// Sends `packet`, receiving output whenever the decoder is full, then collects every frame
/// that became available. Frames are appended to `ready` in decode order.
///
/// #### Parameters
/// - `codec`: Send/receive decoder.
/// - `packet`: Packet to hand over; sent until accepted.
/// - `ready`: Decoded frames not yet handed to the pipeline.
///
/// ### 中文
/// 发送 `packet`；解码器已满时先取出输出，然后收集所有已可用的帧。
/// 帧按解码顺序追加到 `ready`。
///
/// #### 参数
/// - `codec`：send/receive 解码器。
/// - `packet`：要提交的包；会一直发送直到被接受。
/// - `ready`：尚未交给管线的已解码帧。
pub(crate) fn submit<C: SendReceive>(
    codec: &mut C,
    packet: &C::Packet,
    ready: &mut VecDeque<RawFrame>,
) -> Result<(), String> {
    while codec.send(packet)? == SendStatus::Full {
        match codec.receive()? {
            Some(frame) => ready.push_back(frame),
            None => return Err("decoder refused input without producing output".to_string()),
        }
    }
    while let Some(frame) = codec.receive()? {
        ready.push_back(frame);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use dpi::PhysicalSize;

    use super::*;
    use crate::engine::frame::PixelFormat;

    /// Decoder whose output shows up on the next `send` and that refuses input while
    /// `limit` frames wait to be received.
    struct BoundedCodec {
        accepted: Vec<u8>,
        decoding: Option<u8>,
        output: VecDeque<u8>,
        limit: usize,
        stuck: bool,
    }

    impl BoundedCodec {
        fn new(limit: usize) -> Self {
            Self {
                accepted: Vec::new(),
                decoding: None,
                output: VecDeque::new(),
                limit,
                stuck: false,
            }
        }
    }

    fn frame(tag: u8) -> RawFrame {
        RawFrame::filled(PixelFormat::Yuv420p, PhysicalSize::new(2, 2), [tag, 128, 128]).unwrap()
    }

    impl SendReceive for BoundedCodec {
        type Packet = u8;

        fn send(&mut self, packet: &u8) -> Result<SendStatus, String> {
            if let Some(done) = self.decoding.take() {
                self.output.push_back(done);
            }
            if self.stuck || self.output.len() >= self.limit {
                return Ok(SendStatus::Full);
            }
            self.accepted.push(*packet);
            self.decoding = Some(*packet);
            Ok(SendStatus::Accepted)
        }

        fn receive(&mut self) -> Result<Option<RawFrame>, String> {
            if self.stuck {
                return Ok(None);
            }
            Ok(self.output.pop_front().map(frame))
        }
    }

    fn luma(frame: &RawFrame) -> u8 {
        frame.plane(0).texture_bytes()[0]
    }

    #[test]
    fn full_decoder_is_drained_and_packet_resent() {
        let mut codec = BoundedCodec::new(1);
        let mut ready = VecDeque::new();

        for packet in 0..4u8 {
            submit(&mut codec, &packet, &mut ready).unwrap();
        }

        assert_eq!(codec.accepted, vec![0, 1, 2, 3]);
        let tags: Vec<u8> = ready.iter().map(luma).collect();
        assert_eq!(tags, vec![0, 1, 2]);
    }

    #[test]
    fn available_output_is_collected_after_send() {
        let mut codec = BoundedCodec::new(8);
        let mut ready = VecDeque::new();
        submit(&mut codec, &7, &mut ready).unwrap();
        assert!(ready.is_empty());
        submit(&mut codec, &8, &mut ready).unwrap();
        assert_eq!(codec.accepted, vec![7, 8]);
        assert_eq!(ready.len(), 1);
        assert_eq!(luma(&ready[0]), 7);
    }

    #[test]
    fn refusal_without_output_is_an_error() {
        let mut codec = BoundedCodec::new(1);
        codec.stuck = true;
        let mut ready = VecDeque::new();
        assert!(submit(&mut codec, &1, &mut ready).is_err());
        assert!(codec.accepted.is_empty());
    }
}
