use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError, Backend, ChatResponse, IngestResponse};
use crate::chat::ChatSession;
use crate::config::Config;
use crate::model::Model;
use crate::uploader::{parse_selection, Uploader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Uploader,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

type ApiTask<T> = JoinHandle<Result<T, ApiError>>;

pub struct App {
    // Core state
    pub should_quit: bool,
    pub focus: FocusPane,
    pub input_mode: InputMode,

    // Uploader state
    pub upload_input: String,
    pub upload_cursor: usize,
    pub uploader: Uploader,
    pub upload_task: Option<ApiTask<IngestResponse>>,

    // Chat state
    pub chat: ChatSession,
    pub chat_cursor: usize,
    pub chat_task: Option<ApiTask<ChatResponse>>,
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations

    // Model selector
    pub selected_model: Model,
    pub show_model_picker: bool,
    pub model_picker_state: ListState,

    pub animation_frame: u8, // 0-2 for ellipsis animation
    pub status_message: Option<String>,

    // Layout areas for mouse hit-testing
    pub uploader_area: Option<Rect>,
    pub chat_area: Option<Rect>,

    client: ApiClient,
}

impl App {
    pub fn new(client: ApiClient, config: &Config) -> Self {
        let selected_model = config
            .default_model
            .as_deref()
            .and_then(Model::from_str)
            .unwrap_or_default();

        Self {
            should_quit: false,
            focus: FocusPane::Chat,
            input_mode: InputMode::Editing,

            upload_input: String::new(),
            upload_cursor: 0,
            uploader: Uploader::new(),
            upload_task: None,

            chat: ChatSession::from_config(config, selected_model),
            chat_cursor: 0,
            chat_task: None,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            selected_model,
            show_model_picker: false,
            model_picker_state: ListState::default(),

            animation_frame: 0,
            status_message: None,

            uploader_area: None,
            chat_area: None,

            client,
        }
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    // Uploader

    /// Queue the typed selection and send the first file.
    pub fn start_upload(&mut self) {
        let files = parse_selection(&self.upload_input);
        if self.uploader.start(files) {
            self.upload_input.clear();
            self.upload_cursor = 0;
            self.spawn_next_upload();
        }
    }

    fn spawn_next_upload(&mut self) {
        if self.upload_task.is_some() {
            return;
        }
        if let Some(path) = self.uploader.next_file() {
            let client = self.client.clone();
            self.upload_task = Some(tokio::spawn(async move { client.ingest(&path).await }));
        }
    }

    /// Append pasted text (usually a dragged file path) to the upload input.
    pub fn paste_into_upload(&mut self, text: &str) {
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let token = if line.contains(char::is_whitespace) && !line.starts_with('"') {
                format!("\"{}\"", line)
            } else {
                line.to_string()
            };
            if !self.upload_input.is_empty() && !self.upload_input.ends_with(' ') {
                self.upload_input.push(' ');
            }
            self.upload_input.push_str(&token);
        }
        self.upload_cursor = self.upload_input.chars().count();
    }

    // Chat

    pub fn submit_chat(&mut self) {
        if let Some(request) = self.chat.submit() {
            // Scroll to bottom so "Thinking..." is visible
            self.scroll_chat_to_bottom();

            let client = self.client.clone();
            self.chat_task = Some(tokio::spawn(async move { client.chat(&request).await }));
        }
    }

    /// Settle any finished background request. Called on every event.
    pub async fn poll_tasks(&mut self) {
        if self.chat_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.chat_task.take() {
                let result = join_result(task).await;
                self.chat.resolve(result);
                self.chat_cursor = 0;
                self.scroll_chat_to_bottom();
            }
        }

        if self.upload_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.upload_task.take() {
                let result = join_result(task).await;
                self.uploader.complete(result);
                self.spawn_next_upload();
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.chat.is_loading() || self.uploader.is_uploading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Scroll chat to the newest entry
    pub fn scroll_chat_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in self.chat.messages() {
            total_lines = total_lines.saturating_add(1); // "You:" or "Assistant:"
            for line in msg.content.lines() {
                let char_count = line.chars().count();
                let wrapped = char_count.div_ceil(wrap_width).max(1);
                total_lines = total_lines.saturating_add(wrapped as u16);
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        if self.chat.is_loading() {
            total_lines = total_lines.saturating_add(2);
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    // Model picker

    pub fn open_model_picker(&mut self) {
        let current_idx = Model::all()
            .iter()
            .position(|m| *m == self.selected_model)
            .unwrap_or(0);
        self.model_picker_state.select(Some(current_idx));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = Model::all().len();
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some((i + 1).min(len - 1)));
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn highlighted_model(&self) -> Option<Model> {
        self.model_picker_state
            .selected()
            .and_then(|i| Model::all().get(i).copied())
    }

    pub fn select_model(&mut self) {
        if let Some(model) = self.highlighted_model() {
            self.set_model(model);
        }
        self.show_model_picker = false;
    }

    pub fn set_model(&mut self, model: Model) {
        if model != self.selected_model {
            info!(model = model.as_str(), "model changed");
        }
        self.selected_model = model;
        self.chat.model = model;
    }

    /// Select the highlighted model and persist it as the default.
    pub fn save_default_model(&mut self) {
        self.select_model();
        self.status_message = match Config::save_default_model(self.selected_model.as_str()) {
            Ok(()) => Some(format!("Saved {} as default", self.selected_model.display_name())),
            Err(e) => {
                warn!(error = %e, "could not save default model");
                Some(format!("Could not save config: {}", e))
            }
        };
    }
}

async fn join_result<T>(task: ApiTask<T>) -> Result<T, ApiError> {
    task.await
        .unwrap_or_else(|e| Err(ApiError::Task(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_app() -> App {
        App::new(ApiClient::new("http://127.0.0.1:9"), &Config::new())
    }

    async fn settle_uploads(app: &mut App) {
        for _ in 0..200 {
            app.poll_tasks().await;
            if !app.uploader.is_uploading() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("upload batch never finished");
    }

    #[test]
    fn test_default_model_comes_from_config() {
        let mut config = Config::new();
        config.default_model = Some("claude-3".to_string());
        let app = App::new(ApiClient::new("http://localhost:8000"), &config);
        assert_eq!(app.selected_model, Model::Claude3);
        assert_eq!(app.chat.model, Model::Claude3);

        config.default_model = Some("unknown".to_string());
        let app = App::new(ApiClient::new("http://localhost:8000"), &config);
        assert_eq!(app.selected_model, Model::LocalLlama);
    }

    #[test]
    fn test_model_picker_selection_updates_chat() {
        let mut app = test_app();
        app.open_model_picker();
        assert_eq!(app.model_picker_state.selected(), Some(0));

        app.model_picker_nav_down();
        app.model_picker_nav_down();
        app.model_picker_nav_down();
        assert_eq!(app.highlighted_model(), Some(Model::Grok));

        app.select_model();
        assert!(!app.show_model_picker);
        assert_eq!(app.selected_model, Model::Grok);
        assert_eq!(app.chat.model, Model::Grok);
    }

    #[test]
    fn test_paste_quotes_paths_with_spaces() {
        let mut app = test_app();
        app.paste_into_upload("/tmp/resume.pdf\n/tmp/my jd.txt\n");
        assert_eq!(app.upload_input, r#"/tmp/resume.pdf "/tmp/my jd.txt""#);
        assert_eq!(app.upload_cursor, app.upload_input.chars().count());
    }

    #[test]
    fn test_blank_upload_selection_is_ignored() {
        let mut app = test_app();
        app.upload_input = "   ".to_string();
        app.start_upload();
        assert!(!app.uploader.is_uploading());
        assert!(app.upload_task.is_none());
    }

    #[test]
    fn test_blank_chat_spawns_nothing() {
        let mut app = test_app();
        app.chat.input = "  ".to_string();
        app.submit_chat();
        assert!(app.chat_task.is_none());
        assert!(app.chat.messages().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_files_fail_one_by_one() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app();
        app.upload_input = format!(
            "{} {}",
            dir.path().join("first.pdf").display(),
            dir.path().join("second.pdf").display()
        );

        app.start_upload();
        assert!(app.uploader.is_uploading());
        assert!(app.upload_input.is_empty());
        assert_eq!(app.uploader.pending_count(), 1);

        settle_uploads(&mut app).await;

        assert_eq!(
            app.uploader.lines(),
            ["Upload failed for first.pdf", "Upload failed for second.pdf"]
        );
        assert!(app.upload_task.is_none());
    }

    #[test]
    fn test_scroll_follows_transcript() {
        let mut app = test_app();
        app.chat_height = 4;
        app.chat_width = 40;
        app.chat.input = "question".to_string();
        app.chat.submit();
        app.chat.resolve(Ok(ChatResponse {
            answer: "line one\nline two\nline three".to_string(),
            citations: Vec::new(),
        }));

        app.scroll_chat_to_bottom();
        // 3 lines for the user turn, 5 for the assistant turn
        assert_eq!(app.chat_scroll, 4);
    }

    #[test]
    fn test_line_filling_width_takes_exact_rows() {
        let mut app = test_app();
        app.chat_height = 4;
        app.chat_width = 10;
        app.chat.input = "q".to_string();
        app.chat.submit();
        app.chat.resolve(Ok(ChatResponse {
            answer: "a".repeat(20),
            citations: Vec::new(),
        }));

        app.scroll_chat_to_bottom();
        // 3 lines for the user turn, 4 for the assistant turn
        assert_eq!(app.chat_scroll, 3);
    }
}
