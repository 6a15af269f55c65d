//! 流式事件模型与分帧编解码
//!
//! 线路格式：每个事件以空行结束，可选的 `event:` 行给出类型（缺省为 `message`），
//! 一行或多行 `data:` 承载文本，多行 data 以换行拼接

use serde::Serialize;

use super::exec::ExitInfo;

/// 流事件
///
/// 每个流恰好有一个终止事件（Done / Error），且总是最后一个
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum StreamEvent {
    /// 一行输出
    Data(String),
    /// 进程已退出
    Done(ExitInfo),
    /// 执行前或执行中发生意外失败
    Error(String),
    /// 旁路信息（不影响终止语义）
    Info(String),
}

impl StreamEvent {
    pub fn data(line: impl Into<String>) -> Self {
        Self::Data(line.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::Info(message.into())
    }

    /// 事件类型名
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Data(_) => "data",
            StreamEvent::Done(_) => "done",
            StreamEvent::Error(_) => "error",
            StreamEvent::Info(_) => "info",
        }
    }

    /// 事件载荷文本
    pub fn payload(&self) -> String {
        match self {
            StreamEvent::Data(line) => line.clone(),
            StreamEvent::Done(exit) => exit.describe(),
            StreamEvent::Error(message) | StreamEvent::Info(message) => message.clone(),
        }
    }

    /// 线路上的载荷文本：`\r\n` 与单独的 `\r` 都规整为 `\n`
    pub fn wire_payload(&self) -> String {
        let payload = self.payload();
        if payload.contains('\r') {
            payload.replace("\r\n", "\n").replace('\r', "\n")
        } else {
            payload
        }
    }

    /// 是否为终止事件
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done(_) | StreamEvent::Error(_))
    }

    /// SSE 线路上的事件名；data 事件不写 `event:` 行
    pub fn wire_event(&self) -> Option<&'static str> {
        match self {
            StreamEvent::Data(_) => None,
            other => Some(other.kind()),
        }
    }

    /// 编码为一个完整的帧（以空行结束）
    pub fn to_frame(&self) -> String {
        let mut frame = String::new();
        if let Some(event) = self.wire_event() {
            frame.push_str("event: ");
            frame.push_str(event);
            frame.push('\n');
        }
        for line in self.wire_payload().split('\n') {
            frame.push_str("data: ");
            frame.push_str(line);
            frame.push('\n');
        }
        frame.push('\n');
        frame
    }
}

/// 解码得到的帧
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub event: String,
    pub data: String,
}

/// 增量帧解码器（消费端）
///
/// 可喂入任意切分的字节块，返回已完整的帧
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 喂入一块文本，返回其中已完整的帧
    pub fn feed(&mut self, chunk: &str) -> Vec<Frame> {
        self.buffer.push_str(chunk);
        let mut frames = Vec::new();

        while let Some((index, sep_len)) = find_separator(&self.buffer) {
            let block: String = self.buffer[..index].to_string();
            self.buffer.drain(..index + sep_len);
            if let Some(frame) = parse_block(&block) {
                frames.push(frame);
            }
        }

        frames
    }

    /// 流结束时冲刷残余缓冲
    pub fn finish(&mut self) -> Option<Frame> {
        let rest = std::mem::take(&mut self.buffer);
        parse_block(&rest)
    }
}

/// 查找最早的帧分隔符，返回 (位置, 分隔符长度)
fn find_separator(buffer: &str) -> Option<(usize, usize)> {
    let lf = buffer.find("\n\n").map(|i| (i, 2));
    let crlf = buffer.find("\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if b.0 < a.0 { b } else { a }),
        (a, b) => a.or(b),
    }
}

fn parse_block(block: &str) -> Option<Frame> {
    if block.trim().is_empty() {
        return None;
    }

    let mut event = "message".to_string();
    let mut data_lines = Vec::new();
    let mut has_field = false;

    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event = rest.trim().to_string();
            has_field = true;
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim());
            has_field = true;
        }
    }

    // 仅含注释行（如 keepalive）
    if !has_field {
        return None;
    }

    Some(Frame {
        event,
        data: data_lines.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_kinds() {
        assert!(!StreamEvent::data("x").is_terminal());
        assert!(!StreamEvent::info("x").is_terminal());
        assert!(StreamEvent::error("boom").is_terminal());
        assert!(StreamEvent::Done(ExitInfo::exited(0)).is_terminal());
    }

    #[test]
    fn test_data_frame_has_no_event_line() {
        assert_eq!(StreamEvent::data("hello").to_frame(), "data: hello\n\n");
    }

    #[test]
    fn test_done_frame() {
        let frame = StreamEvent::Done(ExitInfo::exited(2)).to_frame();
        assert_eq!(frame, "event: done\ndata: exit 2\n\n");
    }

    #[test]
    fn test_multiline_payload_becomes_multiple_data_lines() {
        let frame = StreamEvent::error("first\nsecond").to_frame();
        assert_eq!(frame, "event: error\ndata: first\ndata: second\n\n");
    }

    #[test]
    fn test_decoder_handles_split_chunks() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed("data: hel").is_empty());
        let frames = decoder.feed("lo\n\nevent: done\ndata: exit 0\n");
        assert_eq!(
            frames,
            vec![Frame {
                event: "message".to_string(),
                data: "hello".to_string()
            }]
        );
        let frames = decoder.feed("\n");
        assert_eq!(frames[0].event, "done");
        assert_eq!(frames[0].data, "exit 0");
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_decoder_joins_data_lines_and_accepts_crlf() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed("event: error\r\ndata: a\r\ndata: b\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "error");
        assert_eq!(frames[0].data, "a\nb");
    }

    #[test]
    fn test_decoder_flushes_trailing_block() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed("\n\n").is_empty());
        assert!(decoder.feed("event: info\ndata: [stream aborted]").is_empty());
        let frame = decoder.finish().unwrap();
        assert_eq!(frame.event, "info");
        assert_eq!(frame.data, "[stream aborted]");
    }

    #[test]
    fn test_encode_then_decode_keeps_order() {
        let events = vec![
            StreamEvent::data("one"),
            StreamEvent::data("two"),
            StreamEvent::Done(ExitInfo::signaled("SIGTERM")),
        ];
        let wire: String = events.iter().map(StreamEvent::to_frame).collect();
        let frames = FrameDecoder::new().feed(&wire);
        let kinds: Vec<&str> = frames.iter().map(|f| f.event.as_str()).collect();
        assert_eq!(kinds, vec!["message", "message", "done"]);
        assert_eq!(frames[2].data, "exit null signal SIGTERM");
    }

    #[test]
    fn test_decoder_skips_comment_blocks() {
        let frames = FrameDecoder::new().feed(":keepalive\n\ndata: x\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "x");
    }

    #[test]
    fn test_carriage_returns_never_reach_the_wire() {
        let event = StreamEvent::error("scp: 10%\r\nscp: failed\rretry");
        assert_eq!(event.wire_payload(), "scp: 10%\nscp: failed\nretry");
        let frame = event.to_frame();
        assert!(!frame.contains('\r'));
        assert_eq!(
            frame,
            "event: error\ndata: scp: 10%\ndata: scp: failed\ndata: retry\n\n"
        );
    }
}
