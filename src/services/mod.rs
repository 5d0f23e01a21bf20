mod resend;

pub use resend::ResendClient;
