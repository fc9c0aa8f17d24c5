use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WidgetError {
    #[snafu(display("host document could not provide '{element}' on `{stage}`: {details}"))]
    SurfaceUnavailable {
        stage: &'static str,
        element: String,
        details: String,
    },
    #[snafu(display("failed to load widget settings from {origin} on `{stage}`: {source}"))]
    SettingsLoad {
        stage: &'static str,
        origin: String,
        #[snafu(source(from(figment::Error, Box::new)))]
        source: Box<figment::Error>,
    },
}

pub type WidgetResult<T> = Result<T, WidgetError>;
