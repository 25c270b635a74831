//! Incremental decoder for `text/event-stream` bodies.

/// One dispatched event: the optional `event:` name and the joined `data:` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

#[derive(Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        self.drain_lines(false)
    }

    /// Flush whatever is buffered once the body has ended.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        self.drain_lines(true)
    }

    fn drain_lines(&mut self, flush: bool) -> Vec<SseEvent> {
        let mut events = Vec::new();
        let mut search_index = 0;

        while let Some(relative_pos) = self.buffer[search_index..].iter().position(|b| *b == b'\n')
        {
            let newline_index = search_index + relative_pos;
            let mut line_end = newline_index;
            if line_end > search_index && self.buffer[line_end - 1] == b'\r' {
                line_end -= 1;
            }

            let line = String::from_utf8_lossy(&self.buffer[search_index..line_end]).into_owned();
            self.process_line(&line, &mut events);
            search_index = newline_index + 1;
        }

        if flush {
            let rest = String::from_utf8_lossy(&self.buffer[search_index..]).into_owned();
            if !rest.trim().is_empty() {
                self.process_line(rest.trim_end_matches('\r'), &mut events);
            }
            self.buffer.clear();
            events.extend(self.dispatch());
        } else if search_index > 0 {
            self.buffer.drain(..search_index);
        }

        events
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        if line.is_empty() {
            events.extend(self.dispatch());
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = self.data.join("\n");
        self.data.clear();
        Some(SseEvent { event, data })
    }
}

pub fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|value| value.eq_ignore_ascii_case("text/event-stream"))
}
