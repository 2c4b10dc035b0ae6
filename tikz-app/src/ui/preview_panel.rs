//! Central panel showing the last rendered diagram

use bevy::prelude::*;
use bevy_egui::egui;
use tikz_core::RenderedImage;

use crate::state::{PreviewTexture, WorkbenchState};

pub fn render(
    ctx: &mut egui::Context,
    state: &ResMut<WorkbenchState>,
    preview: &mut ResMut<PreviewTexture>,
) {
    sync_texture(ctx, state, preview);

    egui::CentralPanel::default()
        .frame(egui::Frame::central_panel(&ctx.style()).fill(egui::Color32::WHITE))
        .show(ctx, |ui| {
            if let Some(err) = &preview.error {
                ui.colored_label(egui::Color32::DARK_RED, err);
            }

            let Some(texture) = &preview.texture else {
                ui.centered_and_justified(|ui| {
                    ui.colored_label(egui::Color32::GRAY, "No diagram yet");
                });
                return;
            };

            // Fit inside the panel, never upscale
            let size = texture.size_vec2();
            let available = ui.available_size();
            let scale = (available.x / size.x).min(available.y / size.y).min(1.0);

            ui.centered_and_justified(|ui| {
                ui.image(egui::ImageSource::Texture(egui::load::SizedTexture::new(
                    texture.id(),
                    size * scale,
                )));
            });
        });
}

/// Upload the workbench preview when it changed since the last frame.
fn sync_texture(
    ctx: &egui::Context,
    state: &ResMut<WorkbenchState>,
    preview: &mut ResMut<PreviewTexture>,
) {
    let revision = state.bench.preview_revision();
    if revision == preview.revision {
        return;
    }
    preview.revision = revision;

    let Some(image) = state.bench.preview() else {
        return;
    };
    match decode(image) {
        Ok(color_image) => {
            preview.texture =
                Some(ctx.load_texture("diagram-preview", color_image, egui::TextureOptions::LINEAR));
            preview.error = None;
        }
        Err(e) => {
            tracing::warn!("Failed to decode preview image: {}", e);
            preview.error = Some(format!("Preview could not be displayed: {}", e));
        }
    }
}

fn decode(image: &RenderedImage) -> Result<egui::ColorImage, image::ImageError> {
    let rgba = image::load_from_memory_with_format(&image.png, image::ImageFormat::Png)?.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw()))
}
