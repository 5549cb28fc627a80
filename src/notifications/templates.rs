//! HTML and plain-text bodies for transactional mail.

pub fn verification_html(link: &str, year: i32) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Verify your email</title>
</head>
<body style="font-family: Arial, sans-serif; margin: 0; padding: 0; background-color: #f4f4f4;">
    <div style="max-width: 600px; margin: 0 auto; background: white; padding: 20px; border-radius: 10px; box-shadow: 0 2px 5px rgba(0,0,0,0.1);">
        <div style="text-align: center; padding: 20px; border-bottom: 2px solid #f4f4f4;">
            <h1 style="color: #0055aa; margin-bottom: 10px;">Welcome to Cancer Classification System</h1>
            <p style="color: #666; font-size: 16px;">Your Advanced Medical Imaging Analysis Platform</p>
        </div>
        <div style="background-color: #f8f9fa; padding: 20px; border-radius: 5px; margin: 20px 0;">
            <h2 style="color: #333; margin-bottom: 15px;">One Last Step!</h2>
            <p style="color: #666; line-height: 1.6;">
                To keep your account secure, please verify your email address by clicking the button below:
            </p>
            <div style="text-align: center; margin: 30px 0;">
                <a href="{link}"
                   style="background-color: #0055aa; color: white; padding: 12px 30px; text-decoration: none; border-radius: 5px; font-weight: bold; display: inline-block;">
                    Verify Email Address
                </a>
            </div>
            <div style="background-color: white; padding: 15px; border-radius: 5px; margin-top: 20px;">
                <p style="color: #666; font-size: 14px; margin: 0;">
                    If the button doesn't work, copy and paste this link in your browser:
                    <br>
                    <span style="color: #0055aa; word-break: break-all;">{link}</span>
                </p>
            </div>
        </div>
        <div style="text-align: center; margin-top: 30px; padding-top: 20px; border-top: 1px solid #eee;">
            <p style="color: #999; font-size: 12px;">
                &copy; {year} Cancer Classification System. All rights reserved.
                <br>
                This is an automated message, please do not reply.
            </p>
        </div>
    </div>
</body>
</html>
"#
    )
}

pub fn verification_text(link: &str) -> String {
    format!(
        "Welcome to Cancer Classification System\n\n\
         Please verify your email address by opening this link:\n{link}\n\n\
         This is an automated message, please do not reply.\n"
    )
}

pub fn reset_html(link: &str, ttl_minutes: i64) -> String {
    let expiry = human_duration(ttl_minutes);
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Password reset</title>
</head>
<body style="font-family: Arial, sans-serif; margin: 0; padding: 0; background-color: #f4f4f4;">
    <div style="max-width: 600px; margin: 0 auto; background: white; padding: 20px; border-radius: 10px;">
        <div style="text-align: center; padding: 20px;">
            <h1 style="color: #0055aa;">Password Reset Request</h1>
        </div>
        <div style="padding: 20px;">
            <p style="color: #666; line-height: 1.6;">
                We received a request to reset your password. Click the button below to create a new password:
            </p>
            <div style="text-align: center; margin: 30px 0;">
                <a href="{link}"
                   style="background-color: #0055aa; color: white; padding: 12px 30px; text-decoration: none; border-radius: 5px; font-weight: bold;">
                    Reset Password
                </a>
            </div>
            <p style="color: #666; font-size: 14px;">
                If you didn't request this password reset, please ignore this email.
                <br>
                This link will expire in {expiry} for security reasons.
            </p>
        </div>
    </div>
</body>
</html>
"#
    )
}

pub fn reset_text(link: &str, ttl_minutes: i64) -> String {
    format!(
        "We received a request to reset your password.\n\n\
         Open this link to choose a new password:\n{link}\n\n\
         If you didn't request this, ignore this email. The link expires in {}.\n",
        human_duration(ttl_minutes)
    )
}

fn human_duration(minutes: i64) -> String {
    match minutes {
        60 => "1 hour".to_string(),
        m if m > 60 && m % 60 == 0 => format!("{} hours", m / 60),
        1 => "1 minute".to_string(),
        m => format!("{m} minutes"),
    }
}
